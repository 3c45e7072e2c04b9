//! Audited verbs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// The verb recorded in `audit_logs.action`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    AssignRole,
    RemoveRole,
    GrantPermission,
    RevokePermission,
    Share,
    Unshare,
    Login,
    Logout,
    LoginFailed,
    SyncPolicies,
    /// Any other verb, stored verbatim.
    Custom(String),
}

impl AuditAction {
    /// Returns the stored upper-snake form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::AssignRole => "ASSIGN_ROLE",
            Self::RemoveRole => "REMOVE_ROLE",
            Self::GrantPermission => "GRANT_PERMISSION",
            Self::RevokePermission => "REVOKE_PERMISSION",
            Self::Share => "SHARE",
            Self::Unshare => "UNSHARE",
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::SyncPolicies => "SYNC_POLICIES",
            Self::Custom(verb) => verb,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CREATE" => Self::Create,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "ASSIGN_ROLE" => Self::AssignRole,
            "REMOVE_ROLE" => Self::RemoveRole,
            "GRANT_PERMISSION" => Self::GrantPermission,
            "REVOKE_PERMISSION" => Self::RevokePermission,
            "SHARE" => Self::Share,
            "UNSHARE" => Self::Unshare,
            "LOGIN" => Self::Login,
            "LOGOUT" => Self::Logout,
            "LOGIN_FAILED" => Self::LoginFailed,
            "SYNC_POLICIES" => Self::SyncPolicies,
            other => Self::Custom(other.to_string()),
        })
    }
}

impl From<&str> for AuditAction {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(action) => action,
            Err(never) => match never {},
        }
    }
}

impl Serialize for AuditAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuditAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_verbs_round_trip_through_strings() {
        for action in [
            AuditAction::AssignRole,
            AuditAction::RevokePermission,
            AuditAction::LoginFailed,
            AuditAction::SyncPolicies,
        ] {
            assert_eq!(AuditAction::from(action.as_str()), action);
        }
    }

    #[test]
    fn unknown_verbs_are_kept() {
        let action = AuditAction::from("EXPORT");
        assert_eq!(action, AuditAction::Custom("EXPORT".to_string()));
        assert_eq!(action.to_string(), "EXPORT");
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&AuditAction::GrantPermission).expect("serialize");
        assert_eq!(json, "\"GRANT_PERMISSION\"");
        let back: AuditAction = serde_json::from_str("\"UNSHARE\"").expect("deserialize");
        assert_eq!(back, AuditAction::Unshare);
    }
}
