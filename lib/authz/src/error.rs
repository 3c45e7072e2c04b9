//! Authorization error types.

use std::fmt;

/// Authorization errors.
#[derive(Debug)]
pub enum AuthzError {
    /// The grant tables could not be read.
    StoreFailed {
        /// Error details.
        details: String,
    },
    /// Invalid permission key, rule, or share input.
    InvalidInput {
        /// Error details.
        details: String,
    },
}

impl fmt::Display for AuthzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreFailed { details } => {
                write!(f, "authorization store query failed: {}", details)
            }
            Self::InvalidInput { details } => {
                write!(f, "invalid authorization input: {}", details)
            }
        }
    }
}

impl std::error::Error for AuthzError {}
