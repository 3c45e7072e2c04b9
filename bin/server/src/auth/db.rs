//! User and session storage.
//!
//! Both tables are written by the identity layer; this service reads them to
//! resolve requests and only deletes sessions (logout, expiry).

use chrono::{DateTime, Utc};
use lexcase_access::{Session, SessionId, User};
use lexcase_core::UserId;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, is_super_admin, is_temporary_super_admin, \
                            super_admin_expires_at, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    is_super_admin: bool,
    is_temporary_super_admin: bool,
    super_admin_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User::with_all_fields(
            UserId::from_uuid(row.id),
            row.email,
            row.is_super_admin,
            row.is_temporary_super_admin,
            row.super_admin_expires_at,
            row.created_at,
            row.updated_at,
        )
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: String,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session::with_all_fields(
            SessionId::new(row.id),
            UserId::from_uuid(row.user_id),
            row.created_at,
            row.expires_at,
        )
    }
}

/// Repository for users.
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads a user with its super-admin flags.
    pub async fn find_by_id(&self, id: UserId) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Returns true if a user with `id` exists.
    pub async fn exists(&self, id: UserId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
    }

    /// Provisions a user.
    pub async fn create(&self, user: &User) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(user.id().as_uuid())
        .bind(user.email())
        .bind(user.is_super_admin_flag())
        .bind(user.is_temporary_super_admin())
        .bind(user.super_admin_expires_at())
        .bind(user.created_at())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map(|_| ())
    }
}

/// Repository for sessions.
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Creates a new session repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Looks a session up by token, expired or not.
    pub async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, sqlx::Error> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Session::from))
    }

    /// Stores a session issued for a user.
    pub async fn create(&self, session: &Session) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(session.id().as_str())
        .bind(session.user_id().as_uuid())
        .bind(session.created_at())
        .bind(session.expires_at())
        .execute(&self.pool)
        .await
        .map(|_| ())
    }

    /// Removes a session. Returns false if the token was unknown.
    pub async fn delete(&self, id: &SessionId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes every session past its expiry. Returns how many went.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
