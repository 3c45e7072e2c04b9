//! Validated SQL identifiers and literal quoting.
//!
//! DDL statements cannot take bind parameters, so every name that ends up in
//! generated policy SQL passes through [`Ident`] and every string constant
//! through [`quote_literal`].

use crate::error::RlsError;
use serde::Serialize;
use std::fmt;

/// Postgres truncates identifiers longer than this many bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// A lowercase, unquoted SQL identifier.
///
/// Restricting to `[a-z_][a-z0-9_]*` keeps the generated names identical to
/// what `pg_policies` reports, so verification can compare them directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Ident(String);

impl Ident {
    /// Validates and wraps `name`.
    pub fn new(name: impl Into<String>) -> Result<Self, RlsError> {
        let name = name.into();
        let reject = |reason: &str| RlsError::InvalidIdentifier {
            identifier: name.clone(),
            reason: reason.to_string(),
        };

        let mut chars = name.chars();
        match chars.next() {
            None => return Err(reject("must not be empty")),
            Some(c) if !(c.is_ascii_lowercase() || c == '_') => {
                return Err(reject("must start with a lowercase letter or '_'"));
            }
            Some(_) => {}
        }
        if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            return Err(reject("may only contain lowercase letters, digits, and '_'"));
        }
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(reject("exceeds 63 bytes"));
        }
        Ok(Self(name))
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders `value` as a single-quoted SQL string literal.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert_eq!(Ident::new("expedientes").expect("valid").as_str(), "expedientes");
        assert!(Ident::new("_private_1").is_ok());
    }

    #[test]
    fn rejects_injection_attempts() {
        assert!(Ident::new("users; DROP TABLE users").is_err());
        assert!(Ident::new("a\"b").is_err());
        assert!(Ident::new("Expedientes").is_err());
        assert!(Ident::new("1table").is_err());
        assert!(Ident::new("").is_err());
    }

    #[test]
    fn rejects_overlong_names() {
        let long = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(Ident::new(long).is_err());
        assert!(Ident::new("a".repeat(MAX_IDENTIFIER_LEN)).is_ok());
    }

    #[test]
    fn literal_quotes_are_doubled() {
        assert_eq!(quote_literal("read"), "'read'");
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
    }
}
