//! JSON API handlers.

pub mod audit;
pub mod rls;
pub mod roles;
pub mod shares;
pub mod user_permissions;
