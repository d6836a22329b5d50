use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use yieldledger_core::PrincipalId;
use yieldledger_events::Event;

use crate::{AuthzError, Role};

/// Event: a role grant was toggled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChanged {
    pub role: Role,
    pub principal: PrincipalId,
    pub enabled: bool,
    pub changed_by: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: the owner changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipTransferred {
    pub previous_owner: PrincipalId,
    pub new_owner: PrincipalId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleEvent {
    RoleChanged(RoleChanged),
    OwnershipTransferred(OwnershipTransferred),
}

impl Event for RoleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RoleEvent::RoleChanged(_) => "auth.role_changed",
            RoleEvent::OwnershipTransferred(_) => "auth.ownership_transferred",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RoleEvent::RoleChanged(e) => e.occurred_at,
            RoleEvent::OwnershipTransferred(e) => e.occurred_at,
        }
    }
}

/// Owner + per-role grant table.
///
/// - No IO
/// - No panics
/// - Grants are plain booleans per (role, principal); revoking an absent grant is a no-op
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRegistry {
    owner: PrincipalId,
    grants: HashMap<Role, HashSet<PrincipalId>>,
}

impl RoleRegistry {
    pub fn new(owner: PrincipalId) -> Result<Self, AuthzError> {
        if owner.is_null() {
            return Err(AuthzError::NullPrincipal("owner"));
        }
        Ok(Self {
            owner,
            grants: HashMap::new(),
        })
    }

    pub fn owner(&self) -> PrincipalId {
        self.owner
    }

    pub fn has_role(&self, role: Role, principal: PrincipalId) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|holders| holders.contains(&principal))
    }

    pub fn roles_of(&self, principal: PrincipalId) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| self.has_role(*role, principal))
            .collect()
    }

    pub fn ensure_owner(&self, caller: PrincipalId) -> Result<(), AuthzError> {
        if caller != self.owner {
            return Err(AuthzError::NotOwner { caller });
        }
        Ok(())
    }

    pub fn ensure_role(&self, caller: PrincipalId, role: Role) -> Result<(), AuthzError> {
        if !self.has_role(role, caller) {
            return Err(AuthzError::MissingRole { caller, role });
        }
        Ok(())
    }

    /// Owner-only toggle of one role grant.
    pub fn set_role(
        &mut self,
        caller: PrincipalId,
        role: Role,
        principal: PrincipalId,
        enabled: bool,
        occurred_at: DateTime<Utc>,
    ) -> Result<RoleEvent, AuthzError> {
        self.ensure_owner(caller)?;
        if principal.is_null() {
            return Err(AuthzError::NullPrincipal("principal"));
        }

        let holders = self.grants.entry(role).or_default();
        if enabled {
            holders.insert(principal);
        } else {
            holders.remove(&principal);
        }

        tracing::info!(%role, %principal, enabled, "role changed");
        Ok(RoleEvent::RoleChanged(RoleChanged {
            role,
            principal,
            enabled,
            changed_by: caller,
            occurred_at,
        }))
    }

    pub fn transfer_ownership(
        &mut self,
        caller: PrincipalId,
        new_owner: PrincipalId,
        occurred_at: DateTime<Utc>,
    ) -> Result<RoleEvent, AuthzError> {
        self.ensure_owner(caller)?;
        if new_owner.is_null() {
            return Err(AuthzError::NullPrincipal("new owner"));
        }

        let previous_owner = self.owner;
        self.owner = new_owner;
        tracing::info!(%previous_owner, %new_owner, "ownership transferred");
        Ok(RoleEvent::OwnershipTransferred(OwnershipTransferred {
            previous_owner,
            new_owner,
            occurred_at,
        }))
    }
}
