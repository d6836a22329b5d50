//! Strongly-typed identifiers used across the domain.
//!
//! The nil UUID plays the role of the "null" identifier: it is never a valid
//! principal, value unit or ledger and is rejected by every validating entry point.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Identity of an actor or account holder (owner, depositor, beneficiary, custody...).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

/// Identifier of a fungible value unit tracked by the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(Uuid);

/// Identifier of a ledger instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// The null identifier.
            pub const NULL: Self = Self(Uuid::nil());

            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn is_null(&self) -> bool {
                self.0.is_nil()
            }

            /// Reject the null identifier with a validation error naming `what`.
            pub fn ensure_present(self, what: &str) -> DomainResult<Self> {
                if self.is_null() {
                    return Err(DomainError::validation(format!("{what} must not be null")));
                }
                Ok(self)
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::validation(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(PrincipalId, "PrincipalId");
impl_uuid_newtype!(UnitId, "UnitId");
impl_uuid_newtype!(LedgerId, "LedgerId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_identifier_is_rejected() {
        let err = PrincipalId::NULL.ensure_present("beneficiary").unwrap_err();
        assert_eq!(
            err,
            DomainError::Validation("beneficiary must not be null".to_string())
        );
        assert!(PrincipalId::new().ensure_present("beneficiary").is_ok());
    }

    #[test]
    fn parse_round_trips_display() {
        let unit = UnitId::new();
        let parsed: UnitId = unit.to_string().parse().unwrap();
        assert_eq!(parsed, unit);
        assert!("not-a-uuid".parse::<LedgerId>().is_err());
    }
}
