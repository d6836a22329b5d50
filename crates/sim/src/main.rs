//! Walkthrough of a vault over in-memory facilities.
//!
//! Runs a deposit/yield/withdraw round, a surplus extraction, a full migration cycle
//! and a reward claim under a manual clock, checks that the event stream alone
//! rebuilds the ledger, and prints every event as one JSON line.

use std::sync::Arc;

use anyhow::{Context, Result, bail, ensure};
use chrono::Utc;
use tracing::info;

use yieldledger_core::{Clock, ManualClock, PrincipalId};
use yieldledger_events::{EventBus, EventEnvelope, InMemoryEventBus};
use yieldledger_surplus::{SurplusEngine, SurplusEvent};
use yieldledger_vault::{
    InMemoryFacilities, InMemoryVault, MigrationOutcome, PrincipalProjection, Vault, VaultConfig,
};

fn main() -> Result<()> {
    yieldledger_observability::init();

    let config = VaultConfig::from_env().context("loading vault configuration")?;
    for line in run(config)? {
        println!("{line}");
    }
    Ok(())
}

fn run(config: VaultConfig) -> Result<Vec<String>> {
    let unit = config.tracked_unit;
    let custody = config.custody;
    let mem = InMemoryFacilities::for_config(&config);
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let owner = PrincipalId::new();

    let vault: InMemoryVault = Vault::new(
        config,
        owner,
        mem.facilities(),
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::new(InMemoryEventBus::new()),
    )?;
    let vault_events = vault.bus().subscribe();

    let (depositor, x, treasury) = (PrincipalId::new(), PrincipalId::new(), PrincipalId::new());
    vault.set_depositor_role(owner, depositor, true)?;
    vault.set_withdrawer_role(owner, x, true)?;

    // Deposit 1000 for X, let the pool earn 100, X takes 500.
    mem.transfers.mint(unit, depositor, 1_000);
    vault.deposit(depositor, unit, 1_000, x)?;
    mem.yield_facility.inject_yield(100);
    vault.withdraw(x, unit, 500, x)?;
    info!(
        balance = vault.balance_of(unit, x)?,
        total_deposited = vault.total_deposited(unit)?,
        "yield round settled"
    );

    // Half of Y's surplus over its externally tracked principal goes to the treasury.
    let y = PrincipalId::new();
    mem.transfers.mint(unit, depositor, 2_000);
    vault.deposit(depositor, unit, 2_000, y)?;
    mem.yield_facility.inject_yield(200);

    let surplus_bus: Arc<InMemoryEventBus<EventEnvelope<SurplusEvent>>> =
        Arc::new(InMemoryEventBus::new());
    let engine = SurplusEngine::new(PrincipalId::new(), owner, surplus_bus)?
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
    let surplus_events = engine.bus().subscribe();
    vault.set_surplus_extractor_role(owner, engine.id(), true)?;
    let skimmed = engine.withdraw_surplus_percent(owner, &vault, unit, y, 2_000, 50, treasury)?;
    ensure!(skimmed > 0, "surplus extraction moved nothing");

    // Migrate Y's remaining balance to the owner once the waiting period has passed.
    match vault.initiate_or_execute_migration(owner, unit, y)? {
        MigrationOutcome::Initiated { executable_at, .. } => clock.set(executable_at),
        other => bail!("expected a migration to be initiated, got {other:?}"),
    }
    let outcome = vault.initiate_or_execute_migration(owner, unit, y)?;
    ensure!(
        matches!(outcome, MigrationOutcome::Executed { .. }),
        "expected the migration to execute, got {outcome:?}"
    );

    mem.staking.accrue_rewards(custody, 10);
    let rewards = vault.claim_rewards(owner, treasury)?;
    info!(skimmed, rewards, "walkthrough complete");

    let mut lines = Vec::new();
    for envelope in vault_events.drain() {
        lines.push(serde_json::to_string(&envelope)?);
    }
    let projection = PrincipalProjection::replay_json(&lines.join("\n"))?;
    ensure!(
        projection.matches(&vault.ledger_snapshot()?),
        "replayed principal diverges from the ledger"
    );

    for envelope in surplus_events.drain() {
        lines.push(serde_json::to_string(&envelope)?);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yieldledger_core::UnitId;

    #[test]
    fn walkthrough_replays_cleanly() {
        let config = VaultConfig::new(UnitId::new(), UnitId::new(), PrincipalId::new());
        let lines = run(config).unwrap();

        for kind in [
            "vault.deposited",
            "vault.withdrawn",
            "vault.migration_initiated",
            "vault.migration_executed",
            "vault.rewards_claimed",
            "surplus.withdrawn",
        ] {
            assert!(
                lines.iter().any(|l| l.contains(kind)),
                "missing {kind} in event stream"
            );
        }
    }
}
