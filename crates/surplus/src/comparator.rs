use yieldledger_accounting::PooledLedger;
use yieldledger_core::{Amount, DomainResult, PrincipalId, UnitId};

/// `max(0, live balance - external_principal)` for `beneficiary` in `ledger`.
///
/// Stateless; works against any conformant ledger.
pub fn get_surplus<L>(
    ledger: &L,
    unit: UnitId,
    beneficiary: PrincipalId,
    external_principal: Amount,
) -> DomainResult<Amount>
where
    L: PooledLedger + ?Sized,
{
    ledger.ledger_id().ensure_present("ledger")?;
    unit.ensure_present("unit")?;
    beneficiary.ensure_present("beneficiary")?;

    let live = ledger.balance_of(unit, beneficiary)?;
    Ok(live.saturating_sub(external_principal))
}
