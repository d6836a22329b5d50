use yieldledger_core::{Amount, DomainResult};

/// Current share position of the pool backing one value unit.
pub trait PoolValuation {
    /// Total shares held in custody for the unit.
    fn pool_shares(&self) -> DomainResult<Amount>;

    /// Value of `shares` in the unit at the current share price.
    fn shares_to_assets(&self, shares: Amount) -> DomainResult<Amount>;
}

impl<P: PoolValuation + ?Sized> PoolValuation for &P {
    fn pool_shares(&self) -> DomainResult<Amount> {
        (**self).pool_shares()
    }

    fn shares_to_assets(&self, shares: Amount) -> DomainResult<Amount> {
        (**self).shares_to_assets(shares)
    }
}
