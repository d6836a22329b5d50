use yieldledger_accounting::PoolValuation;
use yieldledger_core::{Amount, DomainResult, PrincipalId};

use crate::facility::{RewardStaking, YieldFacility};

/// Pool position read once from the facilities.
///
/// Pool shares are the custody address's staked balance; pricing goes through the
/// yield facility at call time.
pub(crate) struct FacilityPool<'a, Y: ?Sized> {
    yield_facility: &'a Y,
    shares: Amount,
}

impl<'a, Y> FacilityPool<'a, Y>
where
    Y: YieldFacility + ?Sized,
{
    pub(crate) fn snapshot<R>(
        yield_facility: &'a Y,
        staking: &R,
        custody: PrincipalId,
    ) -> DomainResult<Self>
    where
        R: RewardStaking + ?Sized,
    {
        Ok(Self {
            yield_facility,
            shares: staking.balance_of(custody)?,
        })
    }

    pub(crate) fn shares(&self) -> Amount {
        self.shares
    }
}

impl<Y> PoolValuation for FacilityPool<'_, Y>
where
    Y: YieldFacility + ?Sized,
{
    fn pool_shares(&self) -> DomainResult<Amount> {
        Ok(self.shares)
    }

    fn shares_to_assets(&self, shares: Amount) -> DomainResult<Amount> {
        Ok(self.yield_facility.convert_to_assets(shares)?)
    }
}
