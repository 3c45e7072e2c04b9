//! Core types shared by every lexcase crate.
//!
//! This crate provides the `Result` alias used for layered error reporting
//! and the strongly-typed identifiers for the access-control entities.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{AuditLogId, ParseIdError, RoleId, ShareId, UserId, UserPermissionId};
