//! Vault configuration.

use core::str::FromStr;

use chrono::Duration;
use tracing::warn;

use yieldledger_core::{DomainError, DomainResult, LedgerId, PrincipalId, UnitId};

use crate::migration::MigrationPolicy;

/// Default mandatory wait between migration initiation and execution.
pub const DEFAULT_MIGRATION_WAIT_HOURS: i64 = 48;

/// Default length of the execution window that follows the wait.
pub const DEFAULT_MIGRATION_WINDOW_HOURS: i64 = 24;

pub const ENV_LEDGER_ID: &str = "YIELDLEDGER_LEDGER_ID";
pub const ENV_TRACKED_UNIT: &str = "YIELDLEDGER_TRACKED_UNIT";
pub const ENV_REWARD_UNIT: &str = "YIELDLEDGER_REWARD_UNIT";
pub const ENV_CUSTODY: &str = "YIELDLEDGER_CUSTODY";
pub const ENV_MIGRATION_WAIT_SECS: &str = "YIELDLEDGER_MIGRATION_WAIT_SECS";
pub const ENV_MIGRATION_WINDOW_SECS: &str = "YIELDLEDGER_MIGRATION_WINDOW_SECS";

/// Static configuration of one vault deployment.
///
/// `tracked_unit` is immutable once the vault is built: exactly one value unit is
/// accepted per vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    pub ledger_id: LedgerId,
    /// The value unit deposited into the yield facility.
    pub tracked_unit: UnitId,
    /// The secondary unit paid out by the reward-staking facility.
    pub reward_unit: UnitId,
    /// Address holding the vault's value, facility shares and staked position.
    pub custody: PrincipalId,
    pub migration_wait: Duration,
    pub migration_window: Duration,
}

impl VaultConfig {
    pub fn new(tracked_unit: UnitId, reward_unit: UnitId, custody: PrincipalId) -> Self {
        Self {
            ledger_id: LedgerId::new(),
            tracked_unit,
            reward_unit,
            custody,
            migration_wait: Duration::hours(DEFAULT_MIGRATION_WAIT_HOURS),
            migration_window: Duration::hours(DEFAULT_MIGRATION_WINDOW_HOURS),
        }
    }

    pub fn with_ledger_id(mut self, ledger_id: LedgerId) -> Self {
        self.ledger_id = ledger_id;
        self
    }

    pub fn with_migration_wait(mut self, wait: Duration) -> Self {
        self.migration_wait = wait;
        self
    }

    pub fn with_migration_window(mut self, window: Duration) -> Self {
        self.migration_window = window;
        self
    }

    pub fn migration_policy(&self) -> MigrationPolicy {
        MigrationPolicy::new(self.migration_wait, self.migration_window)
    }

    /// Load from process environment variables.
    pub fn from_env() -> DomainResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (same keys as [`VaultConfig::from_env`]).
    ///
    /// Missing identifiers are replaced by fresh ones; malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> DomainResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            ledger_id: id_or_fresh(&lookup, ENV_LEDGER_ID)?,
            tracked_unit: id_or_fresh(&lookup, ENV_TRACKED_UNIT)?,
            reward_unit: id_or_fresh(&lookup, ENV_REWARD_UNIT)?,
            custody: id_or_fresh(&lookup, ENV_CUSTODY)?,
            migration_wait: seconds_or(
                &lookup,
                ENV_MIGRATION_WAIT_SECS,
                Duration::hours(DEFAULT_MIGRATION_WAIT_HOURS),
            )?,
            migration_window: seconds_or(
                &lookup,
                ENV_MIGRATION_WINDOW_SECS,
                Duration::hours(DEFAULT_MIGRATION_WINDOW_HOURS),
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DomainResult<()> {
        self.ledger_id.ensure_present("ledger id")?;
        self.tracked_unit.ensure_present("tracked unit")?;
        self.reward_unit.ensure_present("reward unit")?;
        self.custody.ensure_present("custody")?;
        if self.reward_unit == self.tracked_unit {
            return Err(DomainError::validation(
                "reward unit must differ from the tracked unit",
            ));
        }
        if self.migration_wait <= Duration::zero() {
            return Err(DomainError::validation("migration wait must be positive"));
        }
        if self.migration_window <= Duration::zero() {
            return Err(DomainError::validation("migration window must be positive"));
        }
        Ok(())
    }
}

fn id_or_fresh<T, F>(lookup: &F, key: &str) -> DomainResult<T>
where
    T: FromStr<Err = DomainError> + Default,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse(),
        None => {
            warn!(key, "not set; using a freshly generated identifier");
            Ok(T::default())
        }
    }
}

fn seconds_or<F>(lookup: &F, key: &str, default: Duration) -> DomainResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let secs: i64 = raw
        .trim()
        .parse()
        .map_err(|e| DomainError::validation(format!("{key}: {e}")))?;
    Ok(Duration::seconds(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, String)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = VaultConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.migration_wait, Duration::hours(48));
        assert_eq!(config.migration_window, Duration::hours(24));
        assert_ne!(config.tracked_unit, config.reward_unit);
    }

    #[test]
    fn explicit_values_are_parsed() {
        let unit = UnitId::new();
        let custody = PrincipalId::new();
        let config = VaultConfig::from_lookup(lookup(&[
            (ENV_TRACKED_UNIT, unit.to_string()),
            (ENV_CUSTODY, custody.to_string()),
            (ENV_MIGRATION_WAIT_SECS, "60".to_string()),
            (ENV_MIGRATION_WINDOW_SECS, "30".to_string()),
        ]))
        .unwrap();
        assert_eq!(config.tracked_unit, unit);
        assert_eq!(config.custody, custody);
        assert_eq!(config.migration_wait, Duration::seconds(60));
        assert_eq!(config.migration_window, Duration::seconds(30));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = VaultConfig::from_lookup(lookup(&[(ENV_CUSTODY, "nope".to_string())]))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = VaultConfig::from_lookup(lookup(&[(ENV_MIGRATION_WAIT_SECS, "0".to_string())]))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn reward_unit_must_differ() {
        let unit = UnitId::new();
        let config = VaultConfig::new(unit, unit, PrincipalId::new());
        assert!(config.validate().is_err());
    }
}
