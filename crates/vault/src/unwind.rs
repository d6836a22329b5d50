//! Compensation journal for multi-step facility sequences.
//!
//! Every completed external step records its inverse. If a later step or an
//! integrity check fails, the journal is replayed newest-first before the error is
//! returned, so no shares or value are left stranded without a matching ledger
//! update. Compensation is best-effort: a failing inverse is logged and the
//! remaining inverses still run.

use tracing::{error, warn};

use yieldledger_core::{Amount, DomainError, DomainResult, PrincipalId, UnitId};

use crate::facility::{Facilities, RewardStaking, ValueTransfer, YieldFacility};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Compensation {
    /// Send value held in custody back to `to`.
    Refund {
        unit: UnitId,
        to: PrincipalId,
        amount: Amount,
    },
    /// Redeem unstaked shares back into custody.
    RedeemShares { shares: Amount },
    /// Put unstaked shares back into staking.
    Restake { shares: Amount },
    /// Deposit redeemed value back into the facility and stake the new shares.
    Redeposit { assets: Amount },
}

#[derive(Debug)]
pub(crate) struct Unwind<'a, Y, R, T> {
    facilities: &'a Facilities<Y, R, T>,
    custody: PrincipalId,
    steps: Vec<Compensation>,
}

impl<'a, Y, R, T> Unwind<'a, Y, R, T>
where
    Y: YieldFacility,
    R: RewardStaking,
    T: ValueTransfer,
{
    pub(crate) fn new(facilities: &'a Facilities<Y, R, T>, custody: PrincipalId) -> Self {
        Self {
            facilities,
            custody,
            steps: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, step: Compensation) {
        self.steps.push(step);
    }

    /// Replace the newest inverse (its effect was consumed by a later step).
    pub(crate) fn supersede(&mut self, step: Compensation) {
        self.steps.pop();
        self.steps.push(step);
    }

    /// Run `step`; on failure compensate everything recorded so far and return the error.
    pub(crate) fn attempt<V>(
        &mut self,
        op: &'static str,
        step: impl FnOnce() -> DomainResult<V>,
    ) -> DomainResult<V> {
        step().inspect_err(|err| self.compensate(op, err))
    }

    /// Fail the sequence with `err` after compensating.
    pub(crate) fn abort<V>(&mut self, op: &'static str, err: DomainError) -> DomainResult<V> {
        self.compensate(op, &err);
        Err(err)
    }

    /// The sequence completed; nothing is undone.
    pub(crate) fn complete(mut self) {
        self.steps.clear();
    }

    fn compensate(&mut self, op: &'static str, cause: &DomainError) {
        if self.steps.is_empty() {
            return;
        }
        warn!(op, error = %cause, steps = self.steps.len(), "compensating partially applied facility sequence");
        while let Some(step) = self.steps.pop() {
            if let Err(err) = self.undo(step) {
                error!(op, ?step, error = %err, "compensation step failed");
            }
        }
    }

    fn undo(&self, step: Compensation) -> DomainResult<()> {
        let f = self.facilities;
        match step {
            Compensation::Refund { unit, to, amount } => {
                f.transfers.transfer(unit, self.custody, to, amount)?;
            }
            Compensation::RedeemShares { shares } => {
                f.yield_facility.redeem(shares, self.custody, self.custody)?;
            }
            Compensation::Restake { shares } => {
                f.staking.stake(self.custody, shares)?;
            }
            Compensation::Redeposit { assets } => {
                let before = f.yield_facility.balance_of(self.custody)?;
                f.yield_facility.deposit(assets, self.custody)?;
                let issued = f.yield_facility.balance_of(self.custody)?.saturating_sub(before);
                f.staking.stake(self.custody, issued)?;
            }
        }
        Ok(())
    }
}

impl<Y, R, T> Drop for Unwind<'_, Y, R, T> {
    fn drop(&mut self) {
        if !self.steps.is_empty() {
            // Leaving with pending steps means an early return skipped `attempt`/`abort`.
            error!(steps = ?self.steps, "facility sequence dropped with uncompensated steps");
        }
    }
}
