//! Accounting module (proportional principal ledger).
//!
//! Pure domain logic only: no IO, no facility calls. Live balances are projected
//! through a [`PoolValuation`] supplied by the caller.

pub mod ledger;
pub mod pool;
pub mod view;

pub use ledger::{
    ClearBeneficiary, LedgerCommand, LedgerEvent, PrincipalCleared, PrincipalCredited,
    PrincipalReduced, ProportionalLedger, RecordDeposit, RecordWithdrawal, UnitBook,
};
pub use pool::PoolValuation;
pub use view::PooledLedger;
