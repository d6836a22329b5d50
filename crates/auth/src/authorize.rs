use thiserror::Error;

use yieldledger_core::{DomainError, PrincipalId};

use crate::Role;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("caller {caller} is not the owner")]
    NotOwner { caller: PrincipalId },

    #[error("caller {caller} lacks role '{role}'")]
    MissingRole { caller: PrincipalId, role: Role },

    #[error("{0} must not be null")]
    NullPrincipal(&'static str),
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::NullPrincipal(_) => DomainError::validation(value.to_string()),
            _ => DomainError::unauthorized(value.to_string()),
        }
    }
}
