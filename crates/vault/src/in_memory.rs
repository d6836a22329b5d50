//! In-memory facilities for tests, simulations and local development.
//!
//! - No IO
//! - Value, facility shares and staked shares are all real balances, so every
//!   movement the vault makes is observable
//! - Misbehaviour knobs reproduce the facility faults the vault must fence off

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use yieldledger_core::{Amount, PrincipalId, UnitId, mul_div};
use yieldledger_events::{EventEnvelope, InMemoryEventBus};

use crate::config::VaultConfig;
use crate::events::VaultEvent;
use crate::facility::{
    Facilities, FacilityError, FacilityResult, RewardStaking, ValueTransfer, YieldFacility,
};
use crate::vault::Vault;

const BPS: Amount = 10_000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn math(err: yieldledger_core::DomainError) -> FacilityError {
    FacilityError::Rejected(err.to_string())
}

/// Balance table for every value unit.
#[derive(Debug, Default)]
pub struct InMemoryValueTransfer {
    balances: Mutex<HashMap<(UnitId, PrincipalId), Amount>>,
    offline: AtomicBool,
}

impl InMemoryValueTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `amount` of `unit` out of thin air for `holder`.
    pub fn mint(&self, unit: UnitId, holder: PrincipalId, amount: Amount) {
        *lock(&self.balances).entry((unit, holder)).or_insert(0) += amount;
    }

    pub fn balance(&self, unit: UnitId, holder: PrincipalId) -> Amount {
        lock(&self.balances)
            .get(&(unit, holder))
            .copied()
            .unwrap_or(0)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn move_value(
        &self,
        unit: UnitId,
        from: PrincipalId,
        to: PrincipalId,
        amount: Amount,
    ) -> FacilityResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(FacilityError::Unavailable("value transfer offline".into()));
        }

        let mut balances = lock(&self.balances);
        let available = balances.get(&(unit, from)).copied().unwrap_or(0);
        if available < amount {
            return Err(FacilityError::Rejected(format!(
                "{from} holds {available} of {unit}, cannot move {amount}"
            )));
        }
        balances.insert((unit, from), available - amount);
        *balances.entry((unit, to)).or_insert(0) += amount;
        Ok(())
    }
}

impl ValueTransfer for InMemoryValueTransfer {
    fn transfer_from(
        &self,
        unit: UnitId,
        from: PrincipalId,
        to: PrincipalId,
        amount: Amount,
    ) -> FacilityResult<()> {
        self.move_value(unit, from, to, amount)
    }

    fn transfer(
        &self,
        unit: UnitId,
        from: PrincipalId,
        to: PrincipalId,
        amount: Amount,
    ) -> FacilityResult<()> {
        self.move_value(unit, from, to, amount)
    }

    fn balance_of(&self, unit: UnitId, holder: PrincipalId) -> FacilityResult<Amount> {
        Ok(self.balance(unit, holder))
    }
}

#[derive(Debug, Default)]
struct ShareBook {
    total: Amount,
    balances: HashMap<PrincipalId, Amount>,
}

#[derive(Debug, Default)]
struct YieldKnobs {
    redeem_haircut_bps: Amount,
    share_underreport: Amount,
    issue_zero_shares: bool,
    offline: bool,
}

/// Share vault whose assets are the value held at its own address.
///
/// Share price is `assets / shares`, so minting value to the facility address
/// ([`InMemoryYieldFacility::inject_yield`]) raises the price for every holder.
#[derive(Debug)]
pub struct InMemoryYieldFacility {
    unit: UnitId,
    address: PrincipalId,
    transfers: Arc<InMemoryValueTransfer>,
    shares: Mutex<ShareBook>,
    knobs: Mutex<YieldKnobs>,
}

impl InMemoryYieldFacility {
    pub fn new(unit: UnitId, transfers: Arc<InMemoryValueTransfer>) -> Self {
        Self {
            unit,
            address: PrincipalId::new(),
            transfers,
            shares: Mutex::new(ShareBook::default()),
            knobs: Mutex::new(YieldKnobs::default()),
        }
    }

    pub fn address(&self) -> PrincipalId {
        self.address
    }

    pub fn total_assets(&self) -> Amount {
        self.transfers.balance(self.unit, self.address)
    }

    pub fn total_shares(&self) -> Amount {
        lock(&self.shares).total
    }

    pub fn shares_of(&self, holder: PrincipalId) -> Amount {
        lock(&self.shares).balances.get(&holder).copied().unwrap_or(0)
    }

    /// Add `amount` of value to the pool without issuing shares.
    pub fn inject_yield(&self, amount: Amount) {
        self.transfers.mint(self.unit, self.address, amount);
    }

    /// Keep `bps` / 10_000 of every redemption's proceeds (slippage).
    pub fn set_redeem_haircut_bps(&self, bps: Amount) {
        lock(&self.knobs).redeem_haircut_bps = bps.min(BPS);
    }

    /// Report `shares` fewer than were actually issued on deposit.
    pub fn set_share_underreport(&self, shares: Amount) {
        lock(&self.knobs).share_underreport = shares;
    }

    /// Accept deposits without issuing any shares.
    pub fn set_issue_zero_shares(&self, enabled: bool) {
        lock(&self.knobs).issue_zero_shares = enabled;
    }

    pub fn set_offline(&self, offline: bool) {
        lock(&self.knobs).offline = offline;
    }

    /// Move shares between holders (used by the staking facility).
    pub fn transfer_shares(
        &self,
        from: PrincipalId,
        to: PrincipalId,
        shares: Amount,
    ) -> FacilityResult<()> {
        let mut book = lock(&self.shares);
        let held = book.balances.get(&from).copied().unwrap_or(0);
        if held < shares {
            return Err(FacilityError::Rejected(format!(
                "{from} holds {held} shares, cannot move {shares}"
            )));
        }
        book.balances.insert(from, held - shares);
        *book.balances.entry(to).or_insert(0) += shares;
        Ok(())
    }

    fn ensure_online(&self) -> FacilityResult<()> {
        if lock(&self.knobs).offline {
            return Err(FacilityError::Unavailable("yield facility offline".into()));
        }
        Ok(())
    }

    fn to_shares(&self, book: &ShareBook, assets: Amount) -> FacilityResult<Amount> {
        let total_assets = self.total_assets();
        if book.total == 0 || total_assets == 0 {
            return Ok(assets);
        }
        mul_div(assets, book.total, total_assets).map_err(math)
    }

    fn to_assets(&self, book: &ShareBook, shares: Amount) -> FacilityResult<Amount> {
        if book.total == 0 {
            return Ok(shares);
        }
        mul_div(shares, self.total_assets(), book.total).map_err(math)
    }
}

impl YieldFacility for InMemoryYieldFacility {
    fn deposit(&self, assets: Amount, custody: PrincipalId) -> FacilityResult<Amount> {
        self.ensure_online()?;
        if assets == 0 {
            return Err(FacilityError::Rejected("zero deposit".into()));
        }
        let (zero_shares, underreport) = {
            let knobs = lock(&self.knobs);
            (knobs.issue_zero_shares, knobs.share_underreport)
        };

        let mut book = lock(&self.shares);
        let issued = if zero_shares {
            0
        } else {
            self.to_shares(&book, assets)?
        };
        self.transfers
            .move_value(self.unit, custody, self.address, assets)?;
        book.total += issued;
        *book.balances.entry(custody).or_insert(0) += issued;

        Ok(issued.saturating_sub(underreport))
    }

    fn redeem(
        &self,
        shares: Amount,
        recipient: PrincipalId,
        owner: PrincipalId,
    ) -> FacilityResult<Amount> {
        self.ensure_online()?;
        let haircut_bps = lock(&self.knobs).redeem_haircut_bps;

        let mut book = lock(&self.shares);
        let held = book.balances.get(&owner).copied().unwrap_or(0);
        if held < shares {
            return Err(FacilityError::Rejected(format!(
                "{owner} holds {held} shares, cannot redeem {shares}"
            )));
        }

        let gross = self.to_assets(&book, shares)?;
        let assets = gross - mul_div(gross, haircut_bps, BPS).map_err(math)?;
        self.transfers
            .move_value(self.unit, self.address, recipient, assets)?;
        book.balances.insert(owner, held - shares);
        book.total -= shares;

        Ok(assets)
    }

    fn convert_to_shares(&self, assets: Amount) -> FacilityResult<Amount> {
        self.ensure_online()?;
        let book = lock(&self.shares);
        self.to_shares(&book, assets)
    }

    fn convert_to_assets(&self, shares: Amount) -> FacilityResult<Amount> {
        self.ensure_online()?;
        let book = lock(&self.shares);
        self.to_assets(&book, shares)
    }

    fn balance_of(&self, holder: PrincipalId) -> FacilityResult<Amount> {
        self.ensure_online()?;
        Ok(self.shares_of(holder))
    }
}

#[derive(Debug, Default)]
struct StakeBook {
    staked: HashMap<PrincipalId, Amount>,
    earned: HashMap<PrincipalId, Amount>,
}

/// Staking pool that custodies facility shares and pays rewards in a second unit.
#[derive(Debug)]
pub struct InMemoryRewardStaking {
    address: PrincipalId,
    reward_unit: UnitId,
    facility: Arc<InMemoryYieldFacility>,
    transfers: Arc<InMemoryValueTransfer>,
    book: Mutex<StakeBook>,
    fail_stake: AtomicBool,
    reject_reward_claims: AtomicBool,
}

impl InMemoryRewardStaking {
    pub fn new(
        reward_unit: UnitId,
        facility: Arc<InMemoryYieldFacility>,
        transfers: Arc<InMemoryValueTransfer>,
    ) -> Self {
        Self {
            address: PrincipalId::new(),
            reward_unit,
            facility,
            transfers,
            book: Mutex::new(StakeBook::default()),
            fail_stake: AtomicBool::new(false),
            reject_reward_claims: AtomicBool::new(false),
        }
    }

    pub fn staked(&self, holder: PrincipalId) -> Amount {
        lock(&self.book).staked.get(&holder).copied().unwrap_or(0)
    }

    /// Credit `amount` of reward to `holder`, funded by minting to the pool.
    pub fn accrue_rewards(&self, holder: PrincipalId, amount: Amount) {
        self.transfers.mint(self.reward_unit, self.address, amount);
        *lock(&self.book).earned.entry(holder).or_insert(0) += amount;
    }

    pub fn set_fail_stake(&self, fail: bool) {
        self.fail_stake.store(fail, Ordering::SeqCst);
    }

    pub fn set_reject_reward_claims(&self, reject: bool) {
        self.reject_reward_claims.store(reject, Ordering::SeqCst);
    }

    fn pay_rewards(
        &self,
        book: &mut StakeBook,
        holder: PrincipalId,
        recipient: PrincipalId,
    ) -> FacilityResult<()> {
        let amount = book.earned.get(&holder).copied().unwrap_or(0);
        if amount == 0 {
            return Ok(());
        }
        self.transfers
            .move_value(self.reward_unit, self.address, recipient, amount)?;
        book.earned.remove(&holder);
        Ok(())
    }
}

impl RewardStaking for InMemoryRewardStaking {
    fn stake(&self, holder: PrincipalId, shares: Amount) -> FacilityResult<()> {
        if self.fail_stake.load(Ordering::SeqCst) {
            return Err(FacilityError::Rejected("staking paused".into()));
        }
        let mut book = lock(&self.book);
        self.facility.transfer_shares(holder, self.address, shares)?;
        *book.staked.entry(holder).or_insert(0) += shares;
        Ok(())
    }

    fn withdraw(&self, holder: PrincipalId, shares: Amount, claim: bool) -> FacilityResult<()> {
        let mut book = lock(&self.book);
        let staked = book.staked.get(&holder).copied().unwrap_or(0);
        if staked < shares {
            return Err(FacilityError::Rejected(format!(
                "{holder} has {staked} staked, cannot withdraw {shares}"
            )));
        }
        self.facility.transfer_shares(self.address, holder, shares)?;
        book.staked.insert(holder, staked - shares);
        if claim {
            self.pay_rewards(&mut book, holder, holder)?;
        }
        Ok(())
    }

    fn earned(&self, holder: PrincipalId) -> FacilityResult<Amount> {
        Ok(lock(&self.book).earned.get(&holder).copied().unwrap_or(0))
    }

    fn get_reward(
        &self,
        holder: PrincipalId,
        recipient: PrincipalId,
        _extras: bool,
    ) -> FacilityResult<bool> {
        if self.reject_reward_claims.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let mut book = lock(&self.book);
        self.pay_rewards(&mut book, holder, recipient)?;
        Ok(true)
    }

    fn balance_of(&self, holder: PrincipalId) -> FacilityResult<Amount> {
        Ok(self.staked(holder))
    }
}

/// A complete, wired set of in-memory collaborators.
#[derive(Debug, Clone)]
pub struct InMemoryFacilities {
    pub transfers: Arc<InMemoryValueTransfer>,
    pub yield_facility: Arc<InMemoryYieldFacility>,
    pub staking: Arc<InMemoryRewardStaking>,
}

impl InMemoryFacilities {
    pub fn new(tracked_unit: UnitId, reward_unit: UnitId) -> Self {
        let transfers = Arc::new(InMemoryValueTransfer::new());
        let yield_facility = Arc::new(InMemoryYieldFacility::new(
            tracked_unit,
            Arc::clone(&transfers),
        ));
        let staking = Arc::new(InMemoryRewardStaking::new(
            reward_unit,
            Arc::clone(&yield_facility),
            Arc::clone(&transfers),
        ));
        Self {
            transfers,
            yield_facility,
            staking,
        }
    }

    pub fn for_config(config: &VaultConfig) -> Self {
        Self::new(config.tracked_unit, config.reward_unit)
    }

    pub fn facilities(
        &self,
    ) -> Facilities<Arc<InMemoryYieldFacility>, Arc<InMemoryRewardStaking>, Arc<InMemoryValueTransfer>>
    {
        Facilities::new(
            Arc::clone(&self.yield_facility),
            Arc::clone(&self.staking),
            Arc::clone(&self.transfers),
        )
    }
}

pub type InMemoryVaultBus = Arc<InMemoryEventBus<EventEnvelope<VaultEvent>>>;

/// Vault wired to in-memory facilities and an in-memory bus.
pub type InMemoryVault = Vault<
    Arc<InMemoryYieldFacility>,
    Arc<InMemoryRewardStaking>,
    Arc<InMemoryValueTransfer>,
    InMemoryVaultBus,
>;
