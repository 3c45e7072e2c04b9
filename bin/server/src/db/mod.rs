//! Database repositories for the admin surface.
//!
//! - Roles and user-role assignments
//! - Direct per-user permissions

pub mod roles;
pub mod user_permissions;

pub use roles::{NewRole, Role, RoleChanges, RoleRepository, is_valid_role_name};
pub use user_permissions::{UserPermission, UserPermissionRepository};
