//! Principal read model rebuilt from the vault's event stream.
//!
//! The projection never consults the ledger: recorded principal and aggregate
//! principal per unit are derived from `Deposited`, `Withdrawn` and
//! `MigrationExecuted` notifications alone. Applying is idempotent per sequence
//! number (duplicates are skipped) and a gap in the sequence is an error, since
//! every missing event would silently skew the rebuilt figures.

use std::collections::HashMap;

use tracing::debug;

use yieldledger_accounting::ProportionalLedger;
use yieldledger_core::{Amount, DomainError, DomainResult, PrincipalId, UnitId};
use yieldledger_events::EventEnvelope;

use crate::events::VaultEvent;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalProjection {
    principals: HashMap<(UnitId, PrincipalId), Amount>,
    aggregates: HashMap<UnitId, Amount>,
    last_sequence: u64,
}

impl PrincipalProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from newline-delimited JSON envelopes.
    pub fn replay_json(lines: &str) -> DomainResult<Self> {
        let mut projection = Self::new();
        for line in lines.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let envelope: EventEnvelope<VaultEvent> = serde_json::from_str(line)
                .map_err(|e| DomainError::validation(format!("malformed event line: {e}")))?;
            projection.apply_envelope(&envelope)?;
        }
        Ok(projection)
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn apply_envelope(&mut self, envelope: &EventEnvelope<VaultEvent>) -> DomainResult<()> {
        let sequence = envelope.sequence_number();
        if sequence <= self.last_sequence {
            debug!(sequence, last = self.last_sequence, "duplicate event skipped");
            return Ok(());
        }
        if sequence != self.last_sequence + 1 {
            return Err(DomainError::conflict(format!(
                "event stream gap: expected sequence {}, got {sequence}",
                self.last_sequence + 1
            )));
        }

        self.apply(envelope.payload());
        self.last_sequence = sequence;
        Ok(())
    }

    fn apply(&mut self, event: &VaultEvent) {
        match event {
            VaultEvent::Deposited(e) => {
                *self.principals.entry((e.unit, e.beneficiary)).or_insert(0) += e.amount;
                *self.aggregates.entry(e.unit).or_insert(0) += e.amount;
            }
            VaultEvent::Withdrawn(e) => {
                let entry = self.principals.entry((e.unit, e.beneficiary)).or_insert(0);
                *entry = entry.saturating_sub(e.principal_reduction);
                let aggregate = self.aggregates.entry(e.unit).or_insert(0);
                *aggregate = aggregate.saturating_sub(e.principal_reduction);
            }
            VaultEvent::MigrationExecuted(e) => {
                self.principals.insert((e.unit, e.beneficiary), 0);
                let aggregate = self.aggregates.entry(e.unit).or_insert(0);
                *aggregate = aggregate.saturating_sub(e.principal_cleared);
            }
            VaultEvent::Role(_)
            | VaultEvent::EmergencyWithdrawn(_)
            | VaultEvent::MigrationInitiated(_)
            | VaultEvent::MigrationExpired(_)
            | VaultEvent::RewardsClaimed(_) => {}
        }
    }

    pub fn recorded_principal(&self, unit: UnitId, beneficiary: PrincipalId) -> Amount {
        self.principals
            .get(&(unit, beneficiary))
            .copied()
            .unwrap_or(0)
    }

    pub fn aggregate_principal(&self, unit: UnitId) -> Amount {
        self.aggregates.get(&unit).copied().unwrap_or(0)
    }

    /// Whether every figure agrees with `ledger`.
    pub fn matches(&self, ledger: &ProportionalLedger) -> bool {
        let aggregates_agree = self
            .aggregates
            .iter()
            .all(|(unit, amount)| ledger.aggregate_principal(*unit) == *amount);
        let principals_agree = self
            .principals
            .iter()
            .all(|((unit, who), amount)| ledger.recorded_principal(*unit, *who) == *amount);
        aggregates_agree && principals_agree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Deposited, WithdrawalKind, Withdrawn};
    use chrono::Utc;

    fn envelope(seq: u64, event: VaultEvent) -> EventEnvelope<VaultEvent> {
        EventEnvelope::wrap("vault", seq, event)
    }

    fn deposited(unit: UnitId, who: PrincipalId, amount: Amount) -> VaultEvent {
        VaultEvent::Deposited(Deposited {
            unit,
            beneficiary: who,
            depositor: who,
            amount,
            shares: amount,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn rebuilds_principal_from_deposits_and_withdrawals() {
        let (unit, x) = (UnitId::new(), PrincipalId::new());
        let mut p = PrincipalProjection::new();
        p.apply_envelope(&envelope(1, deposited(unit, x, 1000))).unwrap();
        p.apply_envelope(&envelope(
            2,
            VaultEvent::Withdrawn(Withdrawn {
                kind: WithdrawalKind::Beneficiary,
                unit,
                beneficiary: x,
                caller: x,
                recipient: x,
                amount: 500,
                shares_redeemed: 455,
                assets_received: 500,
                principal_reduction: 455,
                occurred_at: Utc::now(),
            }),
        ))
        .unwrap();

        assert_eq!(p.recorded_principal(unit, x), 545);
        assert_eq!(p.aggregate_principal(unit), 545);
        assert_eq!(p.last_sequence(), 2);
    }

    #[test]
    fn duplicates_are_skipped_and_gaps_rejected() {
        let (unit, x) = (UnitId::new(), PrincipalId::new());
        let mut p = PrincipalProjection::new();
        let first = envelope(1, deposited(unit, x, 10));
        p.apply_envelope(&first).unwrap();
        p.apply_envelope(&first).unwrap();
        assert_eq!(p.recorded_principal(unit, x), 10);

        let err = p
            .apply_envelope(&envelope(3, deposited(unit, x, 5)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn replays_json_lines() {
        let (unit, x) = (UnitId::new(), PrincipalId::new());
        let lines = [
            envelope(1, deposited(unit, x, 7)),
            envelope(2, deposited(unit, x, 3)),
        ]
        .map(|e| serde_json::to_string(&e).unwrap())
        .join("\n");

        let p = PrincipalProjection::replay_json(&lines).unwrap();
        assert_eq!(p.recorded_principal(unit, x), 10);
    }
}
