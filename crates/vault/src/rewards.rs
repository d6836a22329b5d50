use tracing::{debug, info, warn};

use yieldledger_core::{Amount, DomainError, DomainResult, PrincipalId};
use yieldledger_events::{EventBus, EventEnvelope};

use crate::events::{RewardsClaimed, VaultEvent};
use crate::facility::{RewardStaking, ValueTransfer, YieldFacility};
use crate::vault::Vault;

impl<Y, R, T, B> Vault<Y, R, T, B>
where
    Y: YieldFacility,
    R: RewardStaking,
    T: ValueTransfer,
    B: EventBus<EventEnvelope<VaultEvent>>,
{
    /// Owner-only: claim staking rewards into custody and forward all of them to
    /// `recipient`. Principal, aggregate and staked shares are untouched.
    pub fn claim_rewards(&self, caller: PrincipalId, recipient: PrincipalId) -> DomainResult<Amount> {
        let _entered = self.reward_ops.enter()?;
        self.read_roles()?.ensure_owner(caller)?;
        recipient.ensure_present("recipient")?;

        let custody = self.config.custody;
        let reward_unit = self.config.reward_unit;
        let f = &self.facilities;

        let before = f.transfers.balance_of(reward_unit, custody)?;
        if !f.staking.get_reward(custody, custody, true)? {
            warn!("reward facility refused the claim");
            return Err(DomainError::integrity("reward claim was not honoured"));
        }
        let claimed = f
            .transfers
            .balance_of(reward_unit, custody)?
            .saturating_sub(before);

        if claimed == 0 {
            debug!("no rewards accrued");
            return Ok(0);
        }

        f.transfers.transfer(reward_unit, custody, recipient, claimed)?;

        info!(%recipient, amount = claimed, "rewards claimed");
        self.emitter.emit(VaultEvent::RewardsClaimed(RewardsClaimed {
            reward_unit,
            recipient,
            amount: claimed,
            occurred_at: self.now(),
        }));
        Ok(claimed)
    }
}
