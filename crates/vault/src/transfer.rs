//! Deposit and withdrawal paths.

use tracing::{debug, info, warn};

use yieldledger_accounting::{LedgerCommand, LedgerEvent, RecordDeposit, RecordWithdrawal};
use yieldledger_auth::Role;
use yieldledger_core::{
    Aggregate, AggregateRoot, Amount, DomainError, DomainResult, ExpectedVersion, PrincipalId,
    UnitId,
};
use yieldledger_events::{EventBus, EventEnvelope};

use crate::events::{Deposited, EmergencyWithdrawn, VaultEvent, WithdrawalKind, Withdrawn};
use crate::facility::{RewardStaking, ValueTransfer, YieldFacility};
use crate::unwind::{Compensation, Unwind};
use crate::vault::Vault;

impl<Y, R, T, B> Vault<Y, R, T, B>
where
    Y: YieldFacility,
    R: RewardStaking,
    T: ValueTransfer,
    B: EventBus<EventEnvelope<VaultEvent>>,
{
    /// Pull `amount` from `caller`, invest and stake it, and credit `beneficiary`.
    ///
    /// Returns the facility shares acquired.
    pub fn deposit(
        &self,
        caller: PrincipalId,
        unit: UnitId,
        amount: Amount,
        beneficiary: PrincipalId,
    ) -> DomainResult<Amount> {
        let _entered = self.ledger_ops.enter()?;
        self.read_roles()?.ensure_role(caller, Role::Depositor)?;
        self.ensure_tracked(unit)?;
        beneficiary.ensure_present("beneficiary")?;
        if amount == 0 {
            return Err(DomainError::validation("deposit amount must be positive"));
        }

        let now = self.now();
        let (events, version) = {
            let ledger = self.read_ledger()?;
            let events = ledger.handle(&LedgerCommand::RecordDeposit(RecordDeposit {
                unit,
                beneficiary,
                amount,
                occurred_at: now,
            }))?;
            (events, ledger.version())
        };

        let custody = self.config.custody;
        let f = &self.facilities;
        let mut unwind = Unwind::new(f, custody);

        unwind.attempt("deposit", || {
            Ok(f.transfers.transfer_from(unit, caller, custody, amount)?)
        })?;
        unwind.record(Compensation::Refund {
            unit,
            to: caller,
            amount,
        });

        let before = unwind.attempt("deposit", || Ok(f.yield_facility.balance_of(custody)?))?;
        let reported = unwind.attempt("deposit", || Ok(f.yield_facility.deposit(amount, custody)?))?;
        let after = unwind.attempt("deposit", || Ok(f.yield_facility.balance_of(custody)?))?;
        let acquired = after.saturating_sub(before);
        if acquired > 0 {
            unwind.record(Compensation::RedeemShares { shares: acquired });
        }

        if reported == 0 || acquired == 0 {
            warn!(%unit, amount, reported, acquired, "facility issued zero shares");
            return unwind.abort(
                "deposit",
                DomainError::integrity("facility issued zero shares for a deposit"),
            );
        }
        if reported != acquired {
            warn!(%unit, amount, reported, acquired, "facility share report mismatch");
            return unwind.abort(
                "deposit",
                DomainError::integrity(format!(
                    "facility reported {reported} shares but {acquired} were acquired"
                )),
            );
        }

        unwind.attempt("deposit", || Ok(f.staking.stake(custody, acquired)?))?;
        unwind.complete();

        self.write_ledger()?
            .commit(ExpectedVersion::Exact(version), &events)?;

        info!(%unit, %beneficiary, depositor = %caller, amount, shares = acquired, "deposit recorded");
        self.emitter.emit(VaultEvent::Deposited(Deposited {
            unit,
            beneficiary,
            depositor: caller,
            amount,
            shares: acquired,
            occurred_at: now,
        }));
        Ok(acquired)
    }

    /// Withdrawer-role withdrawal of `amount` from the caller's own live balance, paid
    /// to `recipient`. Depositing for someone else never grants a claim on their balance.
    pub fn withdraw(
        &self,
        caller: PrincipalId,
        unit: UnitId,
        amount: Amount,
        recipient: PrincipalId,
    ) -> DomainResult<Amount> {
        self.withdraw_for(
            WithdrawalKind::Beneficiary,
            caller,
            unit,
            caller,
            amount,
            recipient,
        )
    }

    /// Surplus-extractor withdrawal of `amount` from `beneficiary`'s live balance,
    /// paid to `recipient`.
    pub fn withdraw_on_behalf(
        &self,
        caller: PrincipalId,
        unit: UnitId,
        beneficiary: PrincipalId,
        amount: Amount,
        recipient: PrincipalId,
    ) -> DomainResult<Amount> {
        self.withdraw_for(
            WithdrawalKind::OnBehalf,
            caller,
            unit,
            beneficiary,
            amount,
            recipient,
        )
    }

    fn withdraw_for(
        &self,
        kind: WithdrawalKind,
        caller: PrincipalId,
        unit: UnitId,
        beneficiary: PrincipalId,
        amount: Amount,
        recipient: PrincipalId,
    ) -> DomainResult<Amount> {
        let _entered = self.ledger_ops.enter()?;
        self.ensure_withdrawal_role(caller, kind)?;
        self.ensure_tracked(unit)?;
        beneficiary.ensure_present("beneficiary")?;
        recipient.ensure_present("recipient")?;
        if amount == 0 {
            return Err(DomainError::validation("withdrawal amount must be positive"));
        }

        let now = self.now();
        let pool = self.pool()?;
        let (events, version) = {
            let ledger = self.read_ledger()?;
            let live = ledger.live_balance(unit, beneficiary, &pool)?;
            let events = ledger.handle(&LedgerCommand::RecordWithdrawal(RecordWithdrawal {
                unit,
                beneficiary,
                requested: amount,
                live_balance: live,
                pool_shares: pool.shares(),
                occurred_at: now,
            }))?;
            (events, ledger.version())
        };
        let (shares, principal_reduction) = events
            .iter()
            .find_map(|event| match event {
                LedgerEvent::PrincipalReduced(e) => Some((e.shares, e.reduction)),
                _ => None,
            })
            .ok_or_else(|| DomainError::invariant("withdrawal produced no principal reduction"))?;
        debug!(%unit, %beneficiary, shares, principal_reduction, "withdrawal sized");

        let assets_received = self.redeem_and_pay("withdraw", unit, shares, amount, recipient)?;

        self.write_ledger()?
            .commit(ExpectedVersion::Exact(version), &events)?;

        info!(%unit, %beneficiary, %recipient, amount, shares, principal_reduction, ?kind, "withdrawal recorded");
        self.emitter.emit(VaultEvent::Withdrawn(Withdrawn {
            kind,
            unit,
            beneficiary,
            caller,
            recipient,
            amount,
            shares_redeemed: shares,
            assets_received,
            principal_reduction,
            occurred_at: now,
        }));
        Ok(amount)
    }

    /// Owner-only withdrawal straight from the pool, bypassing per-beneficiary
    /// accounting. Returns the amount sent to the owner.
    pub fn emergency_withdraw(&self, caller: PrincipalId, amount: Amount) -> DomainResult<Amount> {
        let _entered = self.emergency_ops.enter()?;
        self.read_roles()?.ensure_owner(caller)?;
        if amount == 0 {
            return Err(DomainError::validation("emergency amount must be positive"));
        }

        let custody = self.config.custody;
        let f = &self.facilities;
        let staked = f.staking.balance_of(custody)?;
        if staked == 0 {
            return Err(DomainError::insufficient_shares("no staked shares to redeem"));
        }
        let total_value = f.yield_facility.convert_to_assets(staked)?;
        let shares = if amount >= total_value {
            staked
        } else {
            f.yield_facility.convert_to_shares(amount)?.min(staked)
        };
        if shares == 0 {
            return Err(DomainError::degenerate(format!(
                "emergency amount {amount} rounds to zero shares"
            )));
        }

        let mut unwind = Unwind::new(f, custody);
        unwind.attempt("emergency", || Ok(f.staking.withdraw(custody, shares, false)?))?;
        unwind.record(Compensation::Restake { shares });
        let assets_received =
            unwind.attempt("emergency", || Ok(f.yield_facility.redeem(shares, custody, custody)?))?;
        unwind.supersede(Compensation::Redeposit {
            assets: assets_received,
        });
        let sent = amount.min(assets_received);
        if sent > 0 {
            let unit = self.config.tracked_unit;
            unwind.attempt("emergency", || Ok(f.transfers.transfer(unit, custody, caller, sent)?))?;
        }
        unwind.complete();

        warn!(owner = %caller, requested = amount, shares, assets_received, sent, "emergency withdrawal executed");
        self.emitter.emit(VaultEvent::EmergencyWithdrawn(EmergencyWithdrawn {
            owner: caller,
            requested: amount,
            shares_redeemed: shares,
            assets_received,
            sent,
            occurred_at: self.now(),
        }));
        Ok(sent)
    }

    /// Unstake and redeem `shares`, require at least `amount` back, and pay exactly
    /// `amount` to `recipient`. Any excess stays in custody.
    pub(crate) fn redeem_and_pay(
        &self,
        op: &'static str,
        unit: UnitId,
        shares: Amount,
        amount: Amount,
        recipient: PrincipalId,
    ) -> DomainResult<Amount> {
        let custody = self.config.custody;
        let f = &self.facilities;
        let mut unwind = Unwind::new(f, custody);

        unwind.attempt(op, || Ok(f.staking.withdraw(custody, shares, false)?))?;
        unwind.record(Compensation::Restake { shares });

        let assets = unwind.attempt(op, || Ok(f.yield_facility.redeem(shares, custody, custody)?))?;
        unwind.supersede(Compensation::Redeposit { assets });

        if assets < amount {
            warn!(op, %unit, shares, assets, amount, "redemption proceeds below requested amount");
            return unwind.abort(
                op,
                DomainError::integrity(format!(
                    "redeemed {shares} shares for {assets}, below the {amount} promised"
                )),
            );
        }

        unwind.attempt(op, || Ok(f.transfers.transfer(unit, custody, recipient, amount)?))?;
        unwind.complete();
        Ok(assets)
    }
}
