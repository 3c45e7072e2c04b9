//! The resolved identity of a request.

use crate::session::Session;
use crate::user::User;
use lexcase_core::UserId;

/// The `currentUser` produced by session resolution.
///
/// Handlers receive this after the session token has been mapped to a live
/// user record. It answers identity questions only; permission questions go
/// through the authorizer.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    session: Session,
    user: User,
}

impl CurrentUser {
    /// Creates a current-user context.
    #[must_use]
    pub fn new(session: Session, user: User) -> Self {
        Self { session, user }
    }

    /// Returns the user's ID.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user.id()
    }

    /// Returns the session the request was authenticated with.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the user record.
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Returns true if the user currently bypasses all checks.
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.user.is_super_admin()
    }

    /// Returns true if the acting user is `target`.
    #[must_use]
    pub fn is(&self, target: UserId) -> bool {
        self.user.id() == target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;
    use chrono::Duration;

    #[test]
    fn current_user_exposes_identity() {
        let user = User::new("lawyer@example.com".to_string());
        let session = Session::new(SessionId::generate(), user.id(), Duration::hours(1));
        let current = CurrentUser::new(session, user.clone());

        assert_eq!(current.user_id(), user.id());
        assert!(current.is(user.id()));
        assert!(!current.is(UserId::new()));
        assert!(!current.is_super_admin());
        assert_eq!(current.user().email(), "lawyer@example.com");
    }
}
