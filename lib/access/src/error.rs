//! Error types for authentication and authorization outcomes.
//!
//! - `AuthenticationError`: no usable session
//! - `AuthorizationError`: a valid session that is not allowed to act

use lexcase_core::UserId;
use std::fmt;

/// Errors from resolving a session token to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// No session token was presented.
    MissingToken,
    /// Session not found.
    InvalidSession { session_id: String },
    /// Session has expired.
    SessionExpired { session_id: String },
    /// The session points at a user that no longer exists.
    UserNotFound { user_id: UserId },
    /// The session store could not be queried.
    StoreUnavailable { details: String },
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingToken => write!(f, "no session token presented"),
            Self::InvalidSession { session_id } => {
                write!(f, "invalid session: {session_id}")
            }
            Self::SessionExpired { session_id } => {
                write!(f, "session has expired: {session_id}")
            }
            Self::UserNotFound { user_id } => {
                write!(f, "user not found for session: {user_id}")
            }
            Self::StoreUnavailable { details } => {
                write!(f, "session store unavailable: {details}")
            }
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Errors from authorization decisions.
///
/// `NotFound` is used wherever revealing that a resource exists would leak
/// information to a caller who may not see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// User is not authenticated.
    NotAuthenticated,
    /// User lacks required permission.
    PermissionDenied {
        user_id: UserId,
        action: String,
        resource: String,
    },
    /// Resource is missing, or exists but is neither owned nor shared.
    NotFound { resource: String },
    /// Authorization check failed due to a system error.
    CheckFailed { reason: String },
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "user is not authenticated"),
            Self::PermissionDenied {
                user_id,
                action,
                resource,
            } => {
                write!(
                    f,
                    "user {user_id} lacks permission to {action} on {resource}"
                )
            }
            Self::NotFound { resource } => write!(f, "resource not found: {resource}"),
            Self::CheckFailed { reason } => {
                write!(f, "authorization check failed: {reason}")
            }
        }
    }
}

impl std::error::Error for AuthorizationError {}
