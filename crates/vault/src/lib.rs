//! `yieldledger-vault`: custody engine over an external yield facility.
//!
//! Moves value into and out of the facility, keeps the proportional ledger in step
//! with the shares actually held, runs the owner's time-locked migration and skims
//! staking rewards. External collaborators are injected through the traits in
//! [`facility`].

pub mod config;
pub mod events;
pub mod facility;
pub mod in_memory;
pub mod migration;
pub mod projection;
pub mod vault;

mod pool;
mod rewards;
mod transfer;
mod unwind;


pub use config::VaultConfig;
pub use events::{
    Deposited, EmergencyWithdrawn, MigrationExecuted, MigrationExpired, MigrationInitiated,
    RewardsClaimed, VaultEvent, WithdrawalKind, Withdrawn,
};
pub use facility::{
    Facilities, FacilityError, FacilityResult, RewardStaking, ValueTransfer, YieldFacility,
};
pub use in_memory::{
    InMemoryFacilities, InMemoryRewardStaking, InMemoryValueTransfer, InMemoryVault,
    InMemoryVaultBus, InMemoryYieldFacility,
};
pub use migration::{
    MigrationBook, MigrationOutcome, MigrationPhase, MigrationPolicy, MigrationRecord,
    MigrationStatus,
};
pub use projection::PrincipalProjection;
pub use vault::Vault;
