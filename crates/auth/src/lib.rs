//! `yieldledger-auth`: role registry and capability checks.
//!
//! Pure access-control state: one owner plus independently toggled role grants.
//! Every mutating entry point elsewhere calls a guard from here before touching state.

pub mod authorize;
pub mod registry;
pub mod roles;

pub use authorize::AuthzError;
pub use registry::{OwnershipTransferred, RoleChanged, RoleEvent, RoleRegistry};
pub use roles::Role;
