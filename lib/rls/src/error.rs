//! Error types for policy generation, synchronization, and inspection.

use std::fmt;

/// Row-level security errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlsError {
    /// A table, policy, column, or role name failed validation.
    InvalidIdentifier {
        /// The rejected identifier.
        identifier: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A policy descriptor is internally inconsistent.
    InvalidPolicy {
        /// The policy name.
        policy: String,
        /// Error details.
        details: String,
    },
    /// A single DDL statement failed.
    StatementFailed {
        /// Error details from the database.
        details: String,
    },
    /// The system catalog could not be read.
    CatalogQueryFailed {
        /// Error details.
        details: String,
    },
}

impl fmt::Display for RlsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIdentifier { identifier, reason } => {
                write!(f, "invalid identifier '{}': {}", identifier, reason)
            }
            Self::InvalidPolicy { policy, details } => {
                write!(f, "invalid policy '{}': {}", policy, details)
            }
            Self::StatementFailed { details } => {
                write!(f, "policy statement failed: {}", details)
            }
            Self::CatalogQueryFailed { details } => {
                write!(f, "catalog query failed: {}", details)
            }
        }
    }
}

impl std::error::Error for RlsError {}
