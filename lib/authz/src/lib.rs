//! Permission evaluation and resource sharing for lexcase.
//!
//! Two decision sources live here:
//! - The permission evaluator: role permission maps, direct per-user grants,
//!   and the super-admin override, unioned into a fail-closed decision.
//! - The share registry: per-instance `read`/`write` grants layered on top
//!   of ownership.
//!
//! Row-level security in the database re-enforces the same rules
//! independently (see `lexcase-rls`).

mod authorizer;
mod error;
mod evaluator;
mod share;
mod types;

pub use authorizer::Authorizer;
pub use error::AuthzError;
pub use evaluator::{
    DirectGrant, EffectivePermissions, GrantSnapshot, OWN_RESOURCE, RESOURCE_ACCESS_ACTIONS,
    RevocationPolicy, RoleGrant,
};
pub use share::{ResourceShare, ShareRegistry, decide, levels_for, share_exists_clause};
pub use types::{
    AccessLevel, Operation, PermissionKey, PermissionMap, PermissionRule, ResourceRef,
    ResourceType, WILDCARD,
};
