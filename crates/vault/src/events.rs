//! Notifications published by the vault.
//!
//! Each event carries the unit, principals and amounts needed to rebuild principal
//! state from the stream alone (see [`crate::projection::PrincipalProjection`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use yieldledger_auth::RoleEvent;
use yieldledger_core::{Amount, PrincipalId, UnitId};
use yieldledger_events::Event;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposited {
    pub unit: UnitId,
    pub beneficiary: PrincipalId,
    pub depositor: PrincipalId,
    pub amount: Amount,
    pub shares: Amount,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalKind {
    /// Withdrawer-role withdrawal of the caller's own balance.
    Beneficiary,
    /// Surplus-extractor withdrawal paid to an arbitrary recipient.
    OnBehalf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawn {
    pub kind: WithdrawalKind,
    pub unit: UnitId,
    pub beneficiary: PrincipalId,
    pub caller: PrincipalId,
    pub recipient: PrincipalId,
    pub amount: Amount,
    pub shares_redeemed: Amount,
    pub assets_received: Amount,
    pub principal_reduction: Amount,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyWithdrawn {
    pub owner: PrincipalId,
    pub requested: Amount,
    pub shares_redeemed: Amount,
    pub assets_received: Amount,
    pub sent: Amount,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationInitiated {
    pub unit: UnitId,
    pub beneficiary: PrincipalId,
    pub cached_balance: Amount,
    pub initiated_at: DateTime<Utc>,
    pub executable_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationExpired {
    pub unit: UnitId,
    pub beneficiary: PrincipalId,
    pub initiated_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationExecuted {
    pub unit: UnitId,
    pub beneficiary: PrincipalId,
    pub recipient: PrincipalId,
    pub amount: Amount,
    pub shares_redeemed: Amount,
    pub assets_received: Amount,
    pub principal_cleared: Amount,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsClaimed {
    pub reward_unit: UnitId,
    pub recipient: PrincipalId,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEvent {
    Role(RoleEvent),
    Deposited(Deposited),
    Withdrawn(Withdrawn),
    EmergencyWithdrawn(EmergencyWithdrawn),
    MigrationInitiated(MigrationInitiated),
    MigrationExpired(MigrationExpired),
    MigrationExecuted(MigrationExecuted),
    RewardsClaimed(RewardsClaimed),
}

impl Event for VaultEvent {
    fn event_type(&self) -> &'static str {
        match self {
            VaultEvent::Role(e) => e.event_type(),
            VaultEvent::Deposited(_) => "vault.deposited",
            VaultEvent::Withdrawn(_) => "vault.withdrawn",
            VaultEvent::EmergencyWithdrawn(_) => "vault.emergency_withdrawn",
            VaultEvent::MigrationInitiated(_) => "vault.migration_initiated",
            VaultEvent::MigrationExpired(_) => "vault.migration_expired",
            VaultEvent::MigrationExecuted(_) => "vault.migration_executed",
            VaultEvent::RewardsClaimed(_) => "vault.rewards_claimed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            VaultEvent::Role(e) => e.occurred_at(),
            VaultEvent::Deposited(e) => e.occurred_at,
            VaultEvent::Withdrawn(e) => e.occurred_at,
            VaultEvent::EmergencyWithdrawn(e) => e.occurred_at,
            VaultEvent::MigrationInitiated(e) => e.initiated_at,
            VaultEvent::MigrationExpired(e) => e.occurred_at,
            VaultEvent::MigrationExecuted(e) => e.occurred_at,
            VaultEvent::RewardsClaimed(e) => e.occurred_at,
        }
    }
}

impl From<RoleEvent> for VaultEvent {
    fn from(event: RoleEvent) -> Self {
        VaultEvent::Role(event)
    }
}
