//! Timed migration: the owner's two-phase, time-locked full withdrawal of one
//! beneficiary's balance.
//!
//! A single entry point drives the state machine:
//!
//! - no record: initiate (snapshot the live balance)
//! - record still waiting: fail with the instant execution becomes legal
//! - record inside the execution window: execute and reset
//! - record expired: reset and initiate again in the same call
//!
//! Only the principal-denominated balance is snapshotted. Shares to redeem are
//! re-derived from the live pool at execution time.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use yieldledger_accounting::{ClearBeneficiary, LedgerCommand};
use yieldledger_core::{
    Aggregate, AggregateRoot, Amount, DomainError, DomainResult, ExpectedVersion, PrincipalId,
    UnitId, mul_div, mul_div_ceil,
};
use yieldledger_events::{EventBus, EventEnvelope};

use crate::events::{MigrationExecuted, MigrationExpired, MigrationInitiated, VaultEvent};
use crate::facility::{RewardStaking, ValueTransfer, YieldFacility};
use crate::vault::Vault;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Idle,
    Initiated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub unit: UnitId,
    pub beneficiary: PrincipalId,
    pub cached_balance: Amount,
    pub initiated_at: DateTime<Utc>,
    pub status: MigrationStatus,
}

/// Where a migration record stands at a given instant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MigrationPhase {
    Idle,
    Waiting { executable_at: DateTime<Utc> },
    Executable,
    Expired,
}

/// Wait period `W` followed by an execution window of length `X`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MigrationPolicy {
    wait: Duration,
    window: Duration,
}

impl MigrationPolicy {
    pub fn new(wait: Duration, window: Duration) -> Self {
        Self { wait, window }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn executable_at(&self, initiated_at: DateTime<Utc>) -> DateTime<Utc> {
        initiated_at + self.wait
    }

    pub fn expires_at(&self, initiated_at: DateTime<Utc>) -> DateTime<Utc> {
        initiated_at + self.wait + self.window
    }

    /// Classify `record` at `now`. Both window bounds are inclusive.
    pub fn phase(&self, record: Option<&MigrationRecord>, now: DateTime<Utc>) -> MigrationPhase {
        let Some(record) = record else {
            return MigrationPhase::Idle;
        };
        if record.status == MigrationStatus::Idle {
            return MigrationPhase::Idle;
        }

        let executable_at = self.executable_at(record.initiated_at);
        if now < executable_at {
            MigrationPhase::Waiting { executable_at }
        } else if now <= self.expires_at(record.initiated_at) {
            MigrationPhase::Executable
        } else {
            MigrationPhase::Expired
        }
    }
}

/// Live migration records keyed by (unit, beneficiary).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationBook {
    records: HashMap<(UnitId, PrincipalId), MigrationRecord>,
}

impl MigrationBook {
    pub fn get(&self, unit: UnitId, beneficiary: PrincipalId) -> Option<&MigrationRecord> {
        self.records.get(&(unit, beneficiary))
    }

    pub fn insert(&mut self, record: MigrationRecord) {
        self.records.insert((record.unit, record.beneficiary), record);
    }

    pub fn remove(&mut self, unit: UnitId, beneficiary: PrincipalId) -> Option<MigrationRecord> {
        self.records.remove(&(unit, beneficiary))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Result of one call to [`Vault::initiate_or_execute_migration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    Initiated {
        record: MigrationRecord,
        executable_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        /// An expired record was reset by this same call.
        replaced_expired: bool,
    },
    Executed {
        amount: Amount,
        shares_redeemed: Amount,
        principal_cleared: Amount,
    },
}

impl<Y, R, T, B> Vault<Y, R, T, B>
where
    Y: YieldFacility,
    R: RewardStaking,
    T: ValueTransfer,
    B: EventBus<EventEnvelope<VaultEvent>>,
{
    /// Owner-only entry point of the timed migration state machine.
    pub fn initiate_or_execute_migration(
        &self,
        caller: PrincipalId,
        unit: UnitId,
        beneficiary: PrincipalId,
    ) -> DomainResult<MigrationOutcome> {
        let _entered = self.ledger_ops.enter()?;
        self.read_roles()?.ensure_owner(caller)?;
        self.ensure_tracked(unit)?;
        beneficiary.ensure_present("beneficiary")?;

        let now = self.now();
        let existing = self.migrations()?.get(unit, beneficiary).cloned();
        match self.policy.phase(existing.as_ref(), now) {
            MigrationPhase::Idle => self.initiate(unit, beneficiary, now),
            MigrationPhase::Waiting { executable_at } => {
                Err(DomainError::MigrationPending { executable_at })
            }
            MigrationPhase::Expired => {
                let initiated_at = existing.map(|r| r.initiated_at).unwrap_or(now);
                self.reinitiate_expired(unit, beneficiary, initiated_at, now)
            }
            MigrationPhase::Executable => match existing {
                Some(record) => self.execute(caller, record, now),
                None => Err(DomainError::invariant("executable migration without a record")),
            },
        }
    }

    fn reinitiate_expired(
        &self,
        unit: UnitId,
        beneficiary: PrincipalId,
        expired_initiated_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<MigrationOutcome> {
        // The expired record stays in place if the fresh snapshot is refused.
        let cached_balance = self.snapshot_balance(unit, beneficiary)?;

        warn!(%unit, %beneficiary, initiated_at = %expired_initiated_at, "expired migration reset");
        self.migrations()?.remove(unit, beneficiary);
        self.emitter.emit(VaultEvent::MigrationExpired(MigrationExpired {
            unit,
            beneficiary,
            initiated_at: expired_initiated_at,
            occurred_at: now,
        }));

        self.open(unit, beneficiary, cached_balance, now, true)
    }

    fn initiate(
        &self,
        unit: UnitId,
        beneficiary: PrincipalId,
        now: DateTime<Utc>,
    ) -> DomainResult<MigrationOutcome> {
        let cached_balance = self.snapshot_balance(unit, beneficiary)?;
        self.open(unit, beneficiary, cached_balance, now, false)
    }

    fn snapshot_balance(&self, unit: UnitId, beneficiary: PrincipalId) -> DomainResult<Amount> {
        let balance = self.balance_of(unit, beneficiary)?;
        if balance == 0 {
            return Err(DomainError::InsufficientBalance {
                requested: 1,
                available: 0,
            });
        }
        Ok(balance)
    }

    fn open(
        &self,
        unit: UnitId,
        beneficiary: PrincipalId,
        cached_balance: Amount,
        now: DateTime<Utc>,
        replaced_expired: bool,
    ) -> DomainResult<MigrationOutcome> {
        let record = MigrationRecord {
            unit,
            beneficiary,
            cached_balance,
            initiated_at: now,
            status: MigrationStatus::Initiated,
        };
        let executable_at = self.policy.executable_at(now);
        let expires_at = self.policy.expires_at(now);
        self.migrations()?.insert(record.clone());

        info!(%unit, %beneficiary, cached_balance, %executable_at, "migration initiated");
        self.emitter.emit(VaultEvent::MigrationInitiated(MigrationInitiated {
            unit,
            beneficiary,
            cached_balance,
            initiated_at: now,
            executable_at,
            expires_at,
        }));

        Ok(MigrationOutcome::Initiated {
            record,
            executable_at,
            expires_at,
            replaced_expired,
        })
    }

    fn execute(
        &self,
        owner: PrincipalId,
        record: MigrationRecord,
        now: DateTime<Utc>,
    ) -> DomainResult<MigrationOutcome> {
        let MigrationRecord {
            unit,
            beneficiary,
            cached_balance,
            ..
        } = record;
        let pool = self.pool()?;

        let (events, version, shares, principal_cleared) = {
            let ledger = self.read_ledger()?;
            let recorded = ledger.recorded_principal(unit, beneficiary);
            if recorded == 0 {
                return Err(DomainError::degenerate(
                    "beneficiary has no recorded principal left to migrate",
                ));
            }
            let live = ledger.live_balance(unit, beneficiary, &pool)?;
            let user_shares = ledger.beneficiary_shares(unit, beneficiary, pool.shares())?;
            if mul_div(user_shares, cached_balance, live)? == 0 {
                return Err(DomainError::degenerate("migration rounds to zero shares"));
            }
            // A loss since the snapshot is borne by the remaining beneficiaries.
            let shares = mul_div_ceil(user_shares, cached_balance, live)?;
            let events = ledger.handle(&LedgerCommand::ClearBeneficiary(ClearBeneficiary {
                unit,
                beneficiary,
                occurred_at: now,
            }))?;
            (events, ledger.version(), shares, recorded)
        };
        if shares > pool.shares() {
            return Err(DomainError::insufficient_shares(format!(
                "migration needs {shares} shares, pool holds {}",
                pool.shares()
            )));
        }

        let assets_received =
            self.redeem_and_pay("migration", unit, shares, cached_balance, owner)?;

        self.write_ledger()?
            .commit(ExpectedVersion::Exact(version), &events)?;
        self.migrations()?.remove(unit, beneficiary);

        info!(%unit, %beneficiary, amount = cached_balance, shares, principal_cleared, "migration executed");
        self.emitter.emit(VaultEvent::MigrationExecuted(MigrationExecuted {
            unit,
            beneficiary,
            recipient: owner,
            amount: cached_balance,
            shares_redeemed: shares,
            assets_received,
            principal_cleared,
            occurred_at: now,
        }));

        Ok(MigrationOutcome::Executed {
            amount: cached_balance,
            shares_redeemed: shares,
            principal_cleared,
        })
    }

    pub fn migration_record(
        &self,
        unit: UnitId,
        beneficiary: PrincipalId,
    ) -> DomainResult<Option<MigrationRecord>> {
        Ok(self.migrations()?.get(unit, beneficiary).cloned())
    }

    pub fn migration_phase(
        &self,
        unit: UnitId,
        beneficiary: PrincipalId,
    ) -> DomainResult<MigrationPhase> {
        let now = self.now();
        Ok(self.policy.phase(self.migrations()?.get(unit, beneficiary), now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(at: DateTime<Utc>) -> MigrationRecord {
        MigrationRecord {
            unit: UnitId::new(),
            beneficiary: PrincipalId::new(),
            cached_balance: 10,
            initiated_at: at,
            status: MigrationStatus::Initiated,
        }
    }

    #[test]
    fn phase_boundaries_are_inclusive() {
        let policy = MigrationPolicy::new(Duration::hours(48), Duration::hours(24));
        let t0 = Utc::now();
        let r = record(t0);

        assert_eq!(policy.phase(None, t0), MigrationPhase::Idle);
        assert_eq!(
            policy.phase(Some(&r), t0 + Duration::hours(47)),
            MigrationPhase::Waiting {
                executable_at: t0 + Duration::hours(48)
            }
        );
        assert_eq!(
            policy.phase(Some(&r), t0 + Duration::hours(48)),
            MigrationPhase::Executable
        );
        assert_eq!(
            policy.phase(Some(&r), t0 + Duration::hours(72)),
            MigrationPhase::Executable
        );
        assert_eq!(
            policy.phase(Some(&r), t0 + Duration::hours(72) + Duration::seconds(1)),
            MigrationPhase::Expired
        );
    }

    #[test]
    fn idle_status_is_idle_phase() {
        let policy = MigrationPolicy::new(Duration::hours(1), Duration::hours(1));
        let mut r = record(Utc::now());
        r.status = MigrationStatus::Idle;
        assert_eq!(policy.phase(Some(&r), Utc::now()), MigrationPhase::Idle);
    }

    #[test]
    fn book_is_keyed_by_unit_and_beneficiary() {
        let mut book = MigrationBook::default();
        let r = record(Utc::now());
        book.insert(r.clone());
        book.insert(r.clone());
        assert_eq!(book.len(), 1);
        assert_eq!(book.get(r.unit, r.beneficiary), Some(&r));
        assert!(book.get(UnitId::new(), r.beneficiary).is_none());
        assert_eq!(book.remove(r.unit, r.beneficiary), Some(r));
        assert!(book.is_empty());
    }
}
