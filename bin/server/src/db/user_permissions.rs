//! Direct per-user permission grants.
//!
//! Revocation is soft: the row stays with `granted = false` so its history
//! survives.

use chrono::{DateTime, Utc};
use lexcase_authz::PermissionKey;
use lexcase_core::{UserId, UserPermissionId};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A stored direct grant or soft revocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserPermission {
    pub id: UserPermissionId,
    pub user_id: UserId,
    pub permission_key: PermissionKey,
    pub granted: bool,
    pub scope: Option<serde_json::Value>,
    pub granted_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct UserPermissionRow {
    id: Uuid,
    user_id: Uuid,
    permission_key: String,
    granted: bool,
    scope: Option<serde_json::Value>,
    granted_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserPermissionRow {
    fn try_into_permission(self) -> Result<UserPermission, sqlx::Error> {
        let permission_key = self.permission_key.parse::<PermissionKey>().map_err(|e| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid permission key '{}': {}", self.permission_key, e),
            )))
        })?;
        Ok(UserPermission {
            id: UserPermissionId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            permission_key,
            granted: self.granted,
            scope: self.scope,
            granted_by: self.granted_by.map(UserId::from_uuid),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const PERMISSION_COLUMNS: &str =
    "id, user_id, permission_key, granted, scope, granted_by, created_at, updated_at";

/// Repository for direct permissions.
pub struct UserPermissionRepository {
    pool: PgPool,
}

impl UserPermissionRepository {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lists every row for `user_id`, revoked ones included.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<UserPermission>, sqlx::Error> {
        let rows: Vec<UserPermissionRow> = sqlx::query_as(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM user_permissions WHERE user_id = $1 ORDER BY permission_key"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(UserPermissionRow::try_into_permission)
            .collect()
    }

    /// Grants `key` to `user_id`, reviving a soft-revoked row if one exists.
    pub async fn grant(
        &self,
        user_id: UserId,
        key: &PermissionKey,
        scope: Option<&serde_json::Value>,
        granted_by: UserId,
    ) -> Result<UserPermission, sqlx::Error> {
        let row: UserPermissionRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO user_permissions
                (id, user_id, permission_key, granted, scope, granted_by, created_at, updated_at)
            VALUES ($1, $2, $3, TRUE, $4, $5, NOW(), NOW())
            ON CONFLICT (user_id, permission_key)
            DO UPDATE SET granted = TRUE,
                          scope = EXCLUDED.scope,
                          granted_by = EXCLUDED.granted_by,
                          updated_at = NOW()
            RETURNING {PERMISSION_COLUMNS}
            "#
        ))
        .bind(UserPermissionId::new().as_uuid())
        .bind(user_id.as_uuid())
        .bind(key.to_string())
        .bind(scope)
        .bind(granted_by.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        row.try_into_permission()
    }

    /// Sets `granted` and, when given, `scope` on the row with `id`.
    pub async fn update(
        &self,
        id: UserPermissionId,
        granted: Option<bool>,
        scope: Option<&serde_json::Value>,
        changed_by: UserId,
    ) -> Result<Option<UserPermission>, sqlx::Error> {
        let row: Option<UserPermissionRow> = sqlx::query_as(&format!(
            r#"
            UPDATE user_permissions
            SET granted = COALESCE($2, granted),
                scope = COALESCE($3, scope),
                granted_by = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PERMISSION_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(granted)
        .bind(scope)
        .bind(changed_by.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserPermissionRow::try_into_permission).transpose()
    }

    /// Soft-revokes the row with `id`.
    pub async fn revoke(
        &self,
        id: UserPermissionId,
        revoked_by: UserId,
    ) -> Result<Option<UserPermission>, sqlx::Error> {
        self.update(id, Some(false), None, revoked_by).await
    }
}
