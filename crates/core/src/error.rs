//! Domain error model.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::math::Amount;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every failure surfaced by the ledger, the engines and the registries maps onto
/// one of these variants. All of them are synchronous and never retried internally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The caller lacks the required role (checked before any state access).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A value failed validation (null identifier, zero amount, bad percentage...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Requested amount exceeds the beneficiary's live balance.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    /// Not enough pool shares to satisfy the request.
    #[error("insufficient pool shares: {0}")]
    InsufficientShares(String),

    /// A proportional computation rounded to zero.
    #[error("degenerate computation: {0}")]
    Degenerate(String),

    /// An external facility reported figures that do not match expectations.
    #[error("facility integrity check failed: {0}")]
    FacilityIntegrity(String),

    /// An external facility call failed outright.
    #[error("facility call failed: {0}")]
    Facility(String),

    /// A migration was initiated but its waiting period has not elapsed.
    #[error("migration pending: executable at {executable_at}")]
    MigrationPending { executable_at: DateTime<Utc> },

    /// A call re-entered an operation set it was already executing inside.
    #[error("reentrant call rejected: {0}")]
    Reentrancy(String),

    /// Optimistic version check failed at commit time.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Arithmetic result does not fit into an `Amount`.
    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

/// Coarse classification of a [`DomainError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Authorization,
    Validation,
    InsufficientBalance,
    Degenerate,
    FacilityIntegrity,
    Pending,
    Concurrency,
    Internal,
}

impl DomainError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn insufficient_shares(msg: impl Into<String>) -> Self {
        Self::InsufficientShares(msg.into())
    }

    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::Degenerate(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::FacilityIntegrity(msg.into())
    }

    pub fn facility(msg: impl Into<String>) -> Self {
        Self::Facility(msg.into())
    }

    pub fn reentrancy(msg: impl Into<String>) -> Self {
        Self::Reentrancy(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn overflow(msg: impl Into<String>) -> Self {
        Self::Overflow(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            DomainError::Unauthorized(_) => ErrorClass::Authorization,
            DomainError::Validation(_) => ErrorClass::Validation,
            DomainError::InsufficientBalance { .. } | DomainError::InsufficientShares(_) => {
                ErrorClass::InsufficientBalance
            }
            DomainError::Degenerate(_) => ErrorClass::Degenerate,
            DomainError::FacilityIntegrity(_) | DomainError::Facility(_) => {
                ErrorClass::FacilityIntegrity
            }
            DomainError::MigrationPending { .. } => ErrorClass::Pending,
            DomainError::Reentrancy(_) | DomainError::Conflict(_) => ErrorClass::Concurrency,
            DomainError::Overflow(_) | DomainError::InvariantViolation(_) => ErrorClass::Internal,
        }
    }
}
