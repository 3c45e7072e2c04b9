//! Users, sessions and authentication primitives for lexcase.
//!
//! This crate provides:
//! - The `User` record with its super-admin flags
//! - Opaque session tokens (`Session`, `SessionId`)
//! - `CurrentUser`, the resolved identity handed to request handlers
//! - The authentication/authorization error taxonomy
//!
//! # Example
//!
//! ```
//! use lexcase_access::{CurrentUser, Session, SessionId, User};
//! use chrono::Duration;
//!
//! let mut user = User::new("alice@example.com".to_string());
//! user.grant_super_admin();
//!
//! let session = Session::new(SessionId::generate(), user.id(), Duration::hours(8));
//! let current = CurrentUser::new(session, user);
//!
//! assert!(current.is_super_admin());
//! ```

pub mod auth;
pub mod error;
pub mod session;
pub mod user;

pub use auth::CurrentUser;
pub use error::{AuthenticationError, AuthorizationError};
pub use session::{Session, SessionId};
pub use user::User;
