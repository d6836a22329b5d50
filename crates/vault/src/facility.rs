//! External collaborators consumed by the vault.
//!
//! All three are synchronous, fallible remote calls. The vault never trusts their
//! return values blindly: share counts are cross-checked against balance deltas and
//! redemption proceeds against the promised amount.

use std::sync::Arc;

use thiserror::Error;

use yieldledger_core::{Amount, DomainError, PrincipalId, UnitId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FacilityError {
    /// The facility refused the call (insufficient balance, paused, ...).
    #[error("rejected: {0}")]
    Rejected(String),

    /// The facility could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<FacilityError> for DomainError {
    fn from(err: FacilityError) -> Self {
        DomainError::facility(err.to_string())
    }
}

pub type FacilityResult<T> = Result<T, FacilityError>;

/// Yield-bearing share vault for the tracked unit.
pub trait YieldFacility: Send + Sync {
    /// Move `assets` out of `custody` into the facility; shares are issued to `custody`.
    fn deposit(&self, assets: Amount, custody: PrincipalId) -> FacilityResult<Amount>;

    /// Burn `shares` held by `owner` and send the proceeds to `recipient`.
    fn redeem(
        &self,
        shares: Amount,
        recipient: PrincipalId,
        owner: PrincipalId,
    ) -> FacilityResult<Amount>;

    fn convert_to_shares(&self, assets: Amount) -> FacilityResult<Amount>;

    fn convert_to_assets(&self, shares: Amount) -> FacilityResult<Amount>;

    fn balance_of(&self, holder: PrincipalId) -> FacilityResult<Amount>;
}

/// Reward-staking facility holding the vault's facility shares.
pub trait RewardStaking: Send + Sync {
    fn stake(&self, holder: PrincipalId, shares: Amount) -> FacilityResult<()>;

    /// Return `shares` to `holder`, optionally claiming accrued rewards to it.
    fn withdraw(&self, holder: PrincipalId, shares: Amount, claim: bool) -> FacilityResult<()>;

    fn earned(&self, holder: PrincipalId) -> FacilityResult<Amount>;

    /// Pay `holder`'s accrued rewards to `recipient`. Returns whether the claim succeeded.
    fn get_reward(
        &self,
        holder: PrincipalId,
        recipient: PrincipalId,
        extras: bool,
    ) -> FacilityResult<bool>;

    /// Staked shares of `holder`.
    fn balance_of(&self, holder: PrincipalId) -> FacilityResult<Amount>;
}

/// Pull/push transfer of value units.
pub trait ValueTransfer: Send + Sync {
    /// Pull `amount` from `from` into `to` (an approved pull by the custody holder).
    fn transfer_from(
        &self,
        unit: UnitId,
        from: PrincipalId,
        to: PrincipalId,
        amount: Amount,
    ) -> FacilityResult<()>;

    /// Push `amount` held by `from` to `to`.
    fn transfer(
        &self,
        unit: UnitId,
        from: PrincipalId,
        to: PrincipalId,
        amount: Amount,
    ) -> FacilityResult<()>;

    fn balance_of(&self, unit: UnitId, holder: PrincipalId) -> FacilityResult<Amount>;
}

impl<Y: YieldFacility + ?Sized> YieldFacility for Arc<Y> {
    fn deposit(&self, assets: Amount, custody: PrincipalId) -> FacilityResult<Amount> {
        (**self).deposit(assets, custody)
    }

    fn redeem(
        &self,
        shares: Amount,
        recipient: PrincipalId,
        owner: PrincipalId,
    ) -> FacilityResult<Amount> {
        (**self).redeem(shares, recipient, owner)
    }

    fn convert_to_shares(&self, assets: Amount) -> FacilityResult<Amount> {
        (**self).convert_to_shares(assets)
    }

    fn convert_to_assets(&self, shares: Amount) -> FacilityResult<Amount> {
        (**self).convert_to_assets(shares)
    }

    fn balance_of(&self, holder: PrincipalId) -> FacilityResult<Amount> {
        (**self).balance_of(holder)
    }
}

impl<R: RewardStaking + ?Sized> RewardStaking for Arc<R> {
    fn stake(&self, holder: PrincipalId, shares: Amount) -> FacilityResult<()> {
        (**self).stake(holder, shares)
    }

    fn withdraw(&self, holder: PrincipalId, shares: Amount, claim: bool) -> FacilityResult<()> {
        (**self).withdraw(holder, shares, claim)
    }

    fn earned(&self, holder: PrincipalId) -> FacilityResult<Amount> {
        (**self).earned(holder)
    }

    fn get_reward(
        &self,
        holder: PrincipalId,
        recipient: PrincipalId,
        extras: bool,
    ) -> FacilityResult<bool> {
        (**self).get_reward(holder, recipient, extras)
    }

    fn balance_of(&self, holder: PrincipalId) -> FacilityResult<Amount> {
        (**self).balance_of(holder)
    }
}

impl<T: ValueTransfer + ?Sized> ValueTransfer for Arc<T> {
    fn transfer_from(
        &self,
        unit: UnitId,
        from: PrincipalId,
        to: PrincipalId,
        amount: Amount,
    ) -> FacilityResult<()> {
        (**self).transfer_from(unit, from, to, amount)
    }

    fn transfer(
        &self,
        unit: UnitId,
        from: PrincipalId,
        to: PrincipalId,
        amount: Amount,
    ) -> FacilityResult<()> {
        (**self).transfer(unit, from, to, amount)
    }

    fn balance_of(&self, unit: UnitId, holder: PrincipalId) -> FacilityResult<Amount> {
        (**self).balance_of(unit, holder)
    }
}

/// The three collaborators a vault is built over.
#[derive(Debug, Clone)]
pub struct Facilities<Y, R, T> {
    pub yield_facility: Y,
    pub staking: R,
    pub transfers: T,
}

impl<Y, R, T> Facilities<Y, R, T> {
    pub fn new(yield_facility: Y, staking: R, transfers: T) -> Self {
        Self {
            yield_facility,
            staking,
            transfers,
        }
    }
}
