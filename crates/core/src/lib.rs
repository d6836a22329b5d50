//! `yieldledger-core`: shared domain building blocks.
//!
//! Identifiers, the error taxonomy, amount arithmetic, the injectable clock and the
//! reentrancy guard. No IO.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod guard;
pub mod id;
pub mod math;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DomainError, DomainResult, ErrorClass};
pub use guard::{Entered, ReentrancyGuard};
pub use id::{LedgerId, PrincipalId, UnitId};
pub use math::{Amount, checked_add, checked_sub, mul_div, mul_div_ceil};
