use std::sync::Arc;

use yieldledger_core::{Amount, DomainResult, LedgerId, PrincipalId, UnitId};

/// Surface of a conformant pooled ledger, as seen by components that read balances
/// and extract from them on a beneficiary's behalf.
pub trait PooledLedger: Send + Sync {
    fn ledger_id(&self) -> LedgerId;

    /// Live, yield-adjusted balance of `beneficiary` in `unit`.
    fn balance_of(&self, unit: UnitId, beneficiary: PrincipalId) -> DomainResult<Amount>;

    /// Withdraw `amount` of `beneficiary`'s balance to `recipient`; returns the amount sent.
    fn withdraw_on_behalf(
        &self,
        caller: PrincipalId,
        unit: UnitId,
        beneficiary: PrincipalId,
        amount: Amount,
        recipient: PrincipalId,
    ) -> DomainResult<Amount>;
}

impl<L: PooledLedger + ?Sized> PooledLedger for Arc<L> {
    fn ledger_id(&self) -> LedgerId {
        (**self).ledger_id()
    }

    fn balance_of(&self, unit: UnitId, beneficiary: PrincipalId) -> DomainResult<Amount> {
        (**self).balance_of(unit, beneficiary)
    }

    fn withdraw_on_behalf(
        &self,
        caller: PrincipalId,
        unit: UnitId,
        beneficiary: PrincipalId,
        amount: Amount,
        recipient: PrincipalId,
    ) -> DomainResult<Amount> {
        (**self).withdraw_on_behalf(caller, unit, beneficiary, amount, recipient)
    }
}
