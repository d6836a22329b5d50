use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use yieldledger_accounting::PooledLedger;
use yieldledger_auth::{RoleEvent, RoleRegistry};
use yieldledger_core::{
    Amount, Clock, DomainError, DomainResult, LedgerId, PrincipalId, ReentrancyGuard,
    SystemClock, UnitId, mul_div,
};
use yieldledger_events::{Event, EventBus, EventEmitter, EventEnvelope};

use crate::comparator::get_surplus;

/// Event: part of a beneficiary's surplus was extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurplusWithdrawn {
    pub ledger: LedgerId,
    pub unit: UnitId,
    pub beneficiary: PrincipalId,
    pub external_principal: Amount,
    pub surplus: Amount,
    pub percentage: u8,
    pub amount: Amount,
    pub recipient: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurplusEvent {
    Ownership(RoleEvent),
    Withdrawn(SurplusWithdrawn),
}

impl Event for SurplusEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SurplusEvent::Ownership(e) => e.event_type(),
            SurplusEvent::Withdrawn(_) => "surplus.withdrawn",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SurplusEvent::Ownership(e) => e.occurred_at(),
            SurplusEvent::Withdrawn(e) => e.occurred_at,
        }
    }
}

/// Owner-operated surplus extractor.
///
/// `id` is the principal this engine acts as when calling a ledger; the ledger must
/// grant it the surplus-extractor role. Its owner is independent of any ledger owner.
pub struct SurplusEngine<B> {
    id: PrincipalId,
    registry: RwLock<RoleRegistry>,
    ops: ReentrancyGuard,
    admin_ops: ReentrancyGuard,
    emitter: EventEmitter<B>,
    clock: Arc<dyn Clock>,
}

impl<B> SurplusEngine<B>
where
    B: EventBus<EventEnvelope<SurplusEvent>>,
{
    pub fn new(id: PrincipalId, owner: PrincipalId, bus: B) -> DomainResult<Self> {
        id.ensure_present("engine id")?;
        Ok(Self {
            id,
            registry: RwLock::new(RoleRegistry::new(owner)?),
            ops: ReentrancyGuard::new("surplus"),
            admin_ops: ReentrancyGuard::new("roles"),
            emitter: EventEmitter::new("surplus", bus),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id(&self) -> PrincipalId {
        self.id
    }

    pub fn owner(&self) -> DomainResult<PrincipalId> {
        Ok(self
            .registry
            .read()
            .map_err(|_| DomainError::invariant("surplus registry lock poisoned"))?
            .owner())
    }

    pub fn bus(&self) -> &B {
        self.emitter.bus()
    }

    /// Extract `percentage`% of `beneficiary`'s surplus over `external_principal`,
    /// paid to `recipient` through the ledger's on-behalf withdrawal.
    #[allow(clippy::too_many_arguments)]
    pub fn withdraw_surplus_percent<L>(
        &self,
        caller: PrincipalId,
        ledger: &L,
        unit: UnitId,
        beneficiary: PrincipalId,
        external_principal: Amount,
        percentage: u8,
        recipient: PrincipalId,
    ) -> DomainResult<Amount>
    where
        L: PooledLedger + ?Sized,
    {
        let _entered = self.ops.enter()?;
        self.registry
            .read()
            .map_err(|_| DomainError::invariant("surplus registry lock poisoned"))?
            .ensure_owner(caller)?;
        if !(1..=100).contains(&percentage) {
            return Err(DomainError::validation(format!(
                "percentage must be within 1..=100, got {percentage}"
            )));
        }
        recipient.ensure_present("recipient")?;

        let surplus = get_surplus(ledger, unit, beneficiary, external_principal)?;
        if surplus == 0 {
            return Err(DomainError::validation("no surplus available"));
        }
        let amount = mul_div(surplus, Amount::from(percentage), 100)?;
        if amount == 0 {
            return Err(DomainError::degenerate(format!(
                "{percentage}% of surplus {surplus} rounds to zero"
            )));
        }

        let sent = ledger.withdraw_on_behalf(self.id, unit, beneficiary, amount, recipient)?;

        info!(ledger = %ledger.ledger_id(), %unit, %beneficiary, surplus, percentage, amount = sent, %recipient, "surplus withdrawn");
        self.emitter.emit(SurplusEvent::Withdrawn(SurplusWithdrawn {
            ledger: ledger.ledger_id(),
            unit,
            beneficiary,
            external_principal,
            surplus,
            percentage,
            amount: sent,
            recipient,
            occurred_at: self.clock.now(),
        }));
        Ok(sent)
    }

    pub fn transfer_ownership(&self, caller: PrincipalId, new_owner: PrincipalId) -> DomainResult<()> {
        let _entered = self.admin_ops.enter()?;
        let event = self
            .registry
            .write()
            .map_err(|_| DomainError::invariant("surplus registry lock poisoned"))?
            .transfer_ownership(caller, new_owner, self.clock.now())?;
        self.emitter.emit(SurplusEvent::Ownership(event));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::tests::FixedLedger;
    use yieldledger_events::InMemoryEventBus;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<SurplusEvent>>>;

    struct Fixture {
        engine: SurplusEngine<Bus>,
        owner: PrincipalId,
        unit: UnitId,
        who: PrincipalId,
        ledger: FixedLedger,
    }

    fn fixture(live: Amount) -> Fixture {
        let owner = PrincipalId::new();
        let (unit, who) = (UnitId::new(), PrincipalId::new());
        let engine =
            SurplusEngine::new(PrincipalId::new(), owner, Arc::new(InMemoryEventBus::new())).unwrap();
        Fixture {
            engine,
            owner,
            unit,
            who,
            ledger: FixedLedger::with_balance(unit, who, live),
        }
    }

    #[test]
    fn full_percentage_takes_the_whole_surplus() {
        let f = fixture(1_100);
        let recipient = PrincipalId::new();
        let sub = f.engine.bus().subscribe();

        let sent = f
            .engine
            .withdraw_surplus_percent(f.owner, &f.ledger, f.unit, f.who, 1_000, 100, recipient)
            .unwrap();
        assert_eq!(sent, 100);
        assert_eq!(
            f.ledger.withdrawals.lock().unwrap().as_slice(),
            &[(f.engine.id(), 100, recipient)]
        );

        let events = sub.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "surplus.withdrawn");
    }

    #[test]
    fn one_percent_takes_a_hundredth() {
        let f = fixture(10_000);
        let sent = f
            .engine
            .withdraw_surplus_percent(f.owner, &f.ledger, f.unit, f.who, 5_000, 1, PrincipalId::new())
            .unwrap();
        assert_eq!(sent, 50);
    }

    #[test]
    fn out_of_range_percentages_are_rejected() {
        let f = fixture(2_000);
        for pct in [0u8, 101] {
            let err = f
                .engine
                .withdraw_surplus_percent(f.owner, &f.ledger, f.unit, f.who, 1_000, pct, PrincipalId::new())
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
        assert!(f.ledger.withdrawals.lock().unwrap().is_empty());
    }

    #[test]
    fn no_surplus_and_rounding_to_zero_are_rejected() {
        let f = fixture(1_000);
        let err = f
            .engine
            .withdraw_surplus_percent(f.owner, &f.ledger, f.unit, f.who, 1_000, 50, PrincipalId::new())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let f = fixture(1_050);
        let err = f
            .engine
            .withdraw_surplus_percent(f.owner, &f.ledger, f.unit, f.who, 1_000, 1, PrincipalId::new())
            .unwrap_err();
        assert!(matches!(err, DomainError::Degenerate(_)));
    }

    #[test]
    fn only_the_engine_owner_may_extract() {
        let f = fixture(2_000);
        let intruder = PrincipalId::new();
        let err = f
            .engine
            .withdraw_surplus_percent(intruder, &f.ledger, f.unit, f.who, 1_000, 10, intruder)
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));

        let next = PrincipalId::new();
        f.engine.transfer_ownership(f.owner, next).unwrap();
        assert_eq!(f.engine.owner().unwrap(), next);
        assert!(
            f.engine
                .withdraw_surplus_percent(f.owner, &f.ledger, f.unit, f.who, 1_000, 10, next)
                .is_err()
        );
        assert!(
            f.engine
                .withdraw_surplus_percent(next, &f.ledger, f.unit, f.who, 1_000, 10, next)
                .is_ok()
        );
    }

    #[test]
    fn ownership_transfer_inside_a_busy_roles_set_is_rejected() {
        let f = fixture(2_000);
        let held = f.engine.admin_ops.enter().unwrap();
        assert!(matches!(
            f.engine.transfer_ownership(f.owner, PrincipalId::new()),
            Err(DomainError::Reentrancy(_))
        ));
        // Extraction runs in its own set.
        assert!(
            f.engine
                .withdraw_surplus_percent(f.owner, &f.ledger, f.unit, f.who, 1_000, 10, f.owner)
                .is_ok()
        );
        drop(held);

        assert_eq!(f.engine.owner().unwrap(), f.owner);
    }
}
