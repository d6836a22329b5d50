use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::info;

use yieldledger_accounting::{PooledLedger, ProportionalLedger};
use yieldledger_auth::{Role, RoleEvent, RoleRegistry};
use yieldledger_core::{
    Amount, Clock, DomainError, DomainResult, LedgerId, PrincipalId, ReentrancyGuard, UnitId,
};
use yieldledger_events::{EventBus, EventEmitter, EventEnvelope};

use crate::config::VaultConfig;
use crate::events::{VaultEvent, WithdrawalKind};
use crate::facility::{Facilities, RewardStaking, ValueTransfer, YieldFacility};
use crate::migration::{MigrationBook, MigrationPolicy};
use crate::pool::FacilityPool;

/// Custodial proportional-yield vault for one tracked unit.
///
/// Mutating operations are grouped into operation sets, each serialised by its own
/// [`ReentrancyGuard`]:
///
/// - `ledger`: deposit, withdraw, withdraw-on-behalf, migration
/// - `emergency`: emergency withdrawal
/// - `rewards`: reward claims
/// - `roles`: role grants and ownership transfer
///
/// Ledger events are decided before any facility call and committed only after every
/// facility step succeeded, with an exact version check.
pub struct Vault<Y, R, T, B> {
    pub(crate) config: VaultConfig,
    pub(crate) policy: MigrationPolicy,
    pub(crate) facilities: Facilities<Y, R, T>,
    roles: RwLock<RoleRegistry>,
    ledger: RwLock<ProportionalLedger>,
    migrations: Mutex<MigrationBook>,
    pub(crate) ledger_ops: ReentrancyGuard,
    pub(crate) emergency_ops: ReentrancyGuard,
    pub(crate) reward_ops: ReentrancyGuard,
    pub(crate) role_ops: ReentrancyGuard,
    pub(crate) emitter: EventEmitter<B>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<Y, R, T, B> Vault<Y, R, T, B>
where
    Y: YieldFacility,
    R: RewardStaking,
    T: ValueTransfer,
    B: EventBus<EventEnvelope<VaultEvent>>,
{
    pub fn new(
        config: VaultConfig,
        owner: PrincipalId,
        facilities: Facilities<Y, R, T>,
        clock: Arc<dyn Clock>,
        bus: B,
    ) -> DomainResult<Self> {
        config.validate()?;
        let roles = RoleRegistry::new(owner)?;
        info!(ledger = %config.ledger_id, unit = %config.tracked_unit, %owner, "vault created");

        Ok(Self {
            policy: config.migration_policy(),
            ledger: RwLock::new(ProportionalLedger::empty(config.ledger_id)),
            config,
            facilities,
            roles: RwLock::new(roles),
            migrations: Mutex::new(MigrationBook::default()),
            ledger_ops: ReentrancyGuard::new("ledger"),
            emergency_ops: ReentrancyGuard::new("emergency"),
            reward_ops: ReentrancyGuard::new("rewards"),
            role_ops: ReentrancyGuard::new("roles"),
            emitter: EventEmitter::new("vault", bus),
            clock,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn facilities(&self) -> &Facilities<Y, R, T> {
        &self.facilities
    }

    pub fn bus(&self) -> &B {
        self.emitter.bus()
    }

    // ---- views ----

    /// Live, yield-adjusted balance of `beneficiary`.
    pub fn balance_of(&self, unit: UnitId, beneficiary: PrincipalId) -> DomainResult<Amount> {
        let pool = self.pool()?;
        self.read_ledger()?.live_balance(unit, beneficiary, &pool)
    }

    /// Aggregate recorded principal of `unit`.
    pub fn total_deposited(&self, unit: UnitId) -> DomainResult<Amount> {
        Ok(self.read_ledger()?.aggregate_principal(unit))
    }

    pub fn recorded_principal(&self, unit: UnitId, beneficiary: PrincipalId) -> DomainResult<Amount> {
        Ok(self.read_ledger()?.recorded_principal(unit, beneficiary))
    }

    /// Facility shares staked by the custody address.
    pub fn total_shares(&self) -> DomainResult<Amount> {
        Ok(self.facilities.staking.balance_of(self.config.custody)?)
    }

    /// Rewards accrued to custody and not yet claimed.
    pub fn rewards_available(&self) -> DomainResult<Amount> {
        Ok(self.facilities.staking.earned(self.config.custody)?)
    }

    pub fn ledger_snapshot(&self) -> DomainResult<ProportionalLedger> {
        Ok(self.read_ledger()?.clone())
    }

    pub fn owner(&self) -> DomainResult<PrincipalId> {
        Ok(self.read_roles()?.owner())
    }

    pub fn has_role(&self, role: Role, principal: PrincipalId) -> DomainResult<bool> {
        Ok(self.read_roles()?.has_role(role, principal))
    }

    // ---- role registry ----

    pub fn set_depositor_role(
        &self,
        caller: PrincipalId,
        principal: PrincipalId,
        enabled: bool,
    ) -> DomainResult<()> {
        self.set_role(caller, Role::Depositor, principal, enabled)
    }

    pub fn set_withdrawer_role(
        &self,
        caller: PrincipalId,
        principal: PrincipalId,
        enabled: bool,
    ) -> DomainResult<()> {
        self.set_role(caller, Role::Withdrawer, principal, enabled)
    }

    pub fn set_surplus_extractor_role(
        &self,
        caller: PrincipalId,
        principal: PrincipalId,
        enabled: bool,
    ) -> DomainResult<()> {
        self.set_role(caller, Role::SurplusExtractor, principal, enabled)
    }

    pub fn transfer_ownership(&self, caller: PrincipalId, new_owner: PrincipalId) -> DomainResult<()> {
        let _entered = self.role_ops.enter()?;
        let event = self
            .write_roles()?
            .transfer_ownership(caller, new_owner, self.clock.now())?;
        self.publish_role(event);
        Ok(())
    }

    fn set_role(
        &self,
        caller: PrincipalId,
        role: Role,
        principal: PrincipalId,
        enabled: bool,
    ) -> DomainResult<()> {
        let _entered = self.role_ops.enter()?;
        let event = self
            .write_roles()?
            .set_role(caller, role, principal, enabled, self.clock.now())?;
        self.publish_role(event);
        Ok(())
    }

    fn publish_role(&self, event: RoleEvent) {
        self.emitter.emit(VaultEvent::from(event));
    }

    // ---- internals shared by the operation modules ----

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn pool(&self) -> DomainResult<FacilityPool<'_, Y>> {
        FacilityPool::snapshot(
            &self.facilities.yield_facility,
            &self.facilities.staking,
            self.config.custody,
        )
    }

    pub(crate) fn ensure_tracked(&self, unit: UnitId) -> DomainResult<()> {
        unit.ensure_present("unit")?;
        if unit != self.config.tracked_unit {
            return Err(DomainError::validation(format!(
                "unit {unit} is not tracked by this vault"
            )));
        }
        Ok(())
    }

    pub(crate) fn ensure_withdrawal_role(
        &self,
        caller: PrincipalId,
        kind: WithdrawalKind,
    ) -> DomainResult<()> {
        let role = match kind {
            WithdrawalKind::Beneficiary => Role::Withdrawer,
            WithdrawalKind::OnBehalf => Role::SurplusExtractor,
        };
        Ok(self.read_roles()?.ensure_role(caller, role)?)
    }

    pub(crate) fn read_roles(&self) -> DomainResult<RwLockReadGuard<'_, RoleRegistry>> {
        self.roles
            .read()
            .map_err(|_| DomainError::invariant("role registry lock poisoned"))
    }

    fn write_roles(&self) -> DomainResult<RwLockWriteGuard<'_, RoleRegistry>> {
        self.roles
            .write()
            .map_err(|_| DomainError::invariant("role registry lock poisoned"))
    }

    pub(crate) fn read_ledger(&self) -> DomainResult<RwLockReadGuard<'_, ProportionalLedger>> {
        self.ledger
            .read()
            .map_err(|_| DomainError::invariant("ledger lock poisoned"))
    }

    pub(crate) fn write_ledger(&self) -> DomainResult<RwLockWriteGuard<'_, ProportionalLedger>> {
        self.ledger
            .write()
            .map_err(|_| DomainError::invariant("ledger lock poisoned"))
    }

    pub(crate) fn migrations(&self) -> DomainResult<MutexGuard<'_, MigrationBook>> {
        self.migrations
            .lock()
            .map_err(|_| DomainError::invariant("migration book lock poisoned"))
    }
}

impl<Y, R, T, B> PooledLedger for Vault<Y, R, T, B>
where
    Y: YieldFacility,
    R: RewardStaking,
    T: ValueTransfer,
    B: EventBus<EventEnvelope<VaultEvent>>,
{
    fn ledger_id(&self) -> LedgerId {
        self.config.ledger_id
    }

    fn balance_of(&self, unit: UnitId, beneficiary: PrincipalId) -> DomainResult<Amount> {
        Vault::balance_of(self, unit, beneficiary)
    }

    fn withdraw_on_behalf(
        &self,
        caller: PrincipalId,
        unit: UnitId,
        beneficiary: PrincipalId,
        amount: Amount,
        recipient: PrincipalId,
    ) -> DomainResult<Amount> {
        Vault::withdraw_on_behalf(self, caller, unit, beneficiary, amount, recipient)
    }
}
