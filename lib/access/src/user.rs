//! User domain type.
//!
//! Users are provisioned ahead of time and referenced by audit rows, so they
//! are never physically deleted while audit history points at them.

use chrono::{DateTime, Duration, Utc};
use lexcase_core::UserId;
use serde::{Deserialize, Serialize};

/// A user of the case-management backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal user ID.
    id: UserId,
    /// Login email address.
    email: String,
    /// Permanent super-admin flag. Bypasses every permission and ownership check.
    is_super_admin: bool,
    /// Time-boxed elevation flag, only honoured until `super_admin_expires_at`.
    is_temporary_super_admin: bool,
    /// End of the temporary elevation window.
    super_admin_expires_at: Option<DateTime<Utc>>,
    /// When the user record was created.
    created_at: DateTime<Utc>,
    /// When the user record was last updated.
    updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user without any elevated flags.
    #[must_use]
    pub fn new(email: String) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email,
            is_super_admin: false,
            is_temporary_super_admin: false,
            super_admin_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a user with all fields specified.
    ///
    /// Use this when reconstituting a user from storage.
    #[must_use]
    pub fn with_all_fields(
        id: UserId,
        email: String,
        is_super_admin: bool,
        is_temporary_super_admin: bool,
        super_admin_expires_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            is_super_admin,
            is_temporary_super_admin,
            super_admin_expires_at,
            created_at,
            updated_at,
        }
    }

    /// Returns the user's ID.
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the user's email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the raw permanent super-admin flag.
    #[must_use]
    pub fn is_super_admin_flag(&self) -> bool {
        self.is_super_admin
    }

    /// Returns the raw temporary super-admin flag.
    #[must_use]
    pub fn is_temporary_super_admin(&self) -> bool {
        self.is_temporary_super_admin
    }

    /// Returns when the temporary elevation ends, if one was granted.
    #[must_use]
    pub fn super_admin_expires_at(&self) -> Option<DateTime<Utc>> {
        self.super_admin_expires_at
    }

    /// Returns when the user was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the user was last updated.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if the user currently bypasses all checks.
    ///
    /// A temporary elevation without an expiry, or with an expiry in the
    /// past, confers nothing.
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.is_super_admin_at(Utc::now())
    }

    /// Same as [`User::is_super_admin`] evaluated at a fixed instant.
    #[must_use]
    pub fn is_super_admin_at(&self, now: DateTime<Utc>) -> bool {
        if self.is_super_admin {
            return true;
        }
        self.is_temporary_super_admin
            && self.super_admin_expires_at.is_some_and(|until| until > now)
    }

    /// Sets the permanent super-admin flag.
    pub fn grant_super_admin(&mut self) {
        self.is_super_admin = true;
        self.updated_at = Utc::now();
    }

    /// Grants super-admin rights for a limited time.
    pub fn grant_temporary_super_admin(&mut self, duration: Duration) {
        self.is_temporary_super_admin = true;
        self.super_admin_expires_at = Some(Utc::now() + duration);
        self.updated_at = Utc::now();
    }

    /// Clears both elevation flags.
    pub fn revoke_super_admin(&mut self) {
        self.is_super_admin = false;
        self.is_temporary_super_admin = false;
        self.super_admin_expires_at = None;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_is_not_elevated() {
        let user = User::new("ana@example.com".to_string());
        assert_eq!(user.email(), "ana@example.com");
        assert!(!user.is_super_admin());
        assert!(!user.is_temporary_super_admin());
        assert!(user.super_admin_expires_at().is_none());
        assert_eq!(user.created_at(), user.updated_at());
    }

    #[test]
    fn permanent_flag_makes_super_admin() {
        let mut user = User::new("root@example.com".to_string());
        user.grant_super_admin();
        assert!(user.is_super_admin());
        assert!(user.is_super_admin_flag());
    }

    #[test]
    fn temporary_elevation_is_time_boxed() {
        let mut user = User::new("temp@example.com".to_string());
        user.grant_temporary_super_admin(Duration::minutes(30));

        let now = Utc::now();
        assert!(user.is_super_admin_at(now));
        assert!(!user.is_super_admin_at(now + Duration::hours(1)));
    }

    #[test]
    fn temporary_flag_without_expiry_confers_nothing() {
        let now = Utc::now();
        let user = User::with_all_fields(
            UserId::new(),
            "odd@example.com".to_string(),
            false,
            true,
            None,
            now,
            now,
        );
        assert!(!user.is_super_admin());
    }

    #[test]
    fn revoke_clears_all_flags() {
        let mut user = User::new("x@example.com".to_string());
        user.grant_super_admin();
        user.grant_temporary_super_admin(Duration::hours(1));
        user.revoke_super_admin();
        assert!(!user.is_super_admin());
        assert!(user.super_admin_expires_at().is_none());
    }

    #[test]
    fn user_serialization_roundtrip() {
        let mut user = User::new("roundtrip@example.com".to_string());
        user.grant_temporary_super_admin(Duration::hours(2));

        let json = serde_json::to_string(&user).expect("serialize");
        let parsed: User = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(user, parsed);
    }
}
