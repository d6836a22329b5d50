//! `yieldledger-surplus`: surplus detection and partial extraction.
//!
//! Compares a pooled ledger's live balance against a principal figure tracked by a
//! different system and skims a percentage of the positive difference. The
//! external principal is always caller-supplied; its accuracy is a trust
//! assumption this crate cannot check.

pub mod comparator;
pub mod engine;

pub use comparator::get_surplus;
pub use engine::{SurplusEngine, SurplusEvent, SurplusWithdrawn};
