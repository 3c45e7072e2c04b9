//! Audit errors.

use std::fmt;

/// Errors from the audit read path.
///
/// Writes never surface errors; see [`crate::AuditLogger::log_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// Reading audit rows failed.
    QueryFailed {
        /// Error details.
        details: String,
    },
    /// A filter or window argument was rejected.
    InvalidInput {
        /// Error details.
        details: String,
    },
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueryFailed { details } => write!(f, "audit query failed: {}", details),
            Self::InvalidInput { details } => write!(f, "invalid audit query: {}", details),
        }
    }
}

impl std::error::Error for AuditError {}
