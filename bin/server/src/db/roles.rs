//! Role storage and user-role assignment.

use chrono::{DateTime, Utc};
use lexcase_authz::PermissionMap;
use lexcase_core::{RoleId, UserId};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A named permission bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub permissions: PermissionMap,
    pub is_system_role: bool,
    pub can_be_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Returns true if the role may be deleted.
    #[must_use]
    pub fn is_deletable(&self) -> bool {
        !self.is_system_role && self.can_be_deleted
    }
}

/// Returns true if `name` is a valid role machine key.
#[must_use]
pub fn is_valid_role_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Fields for a new role.
#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub permissions: PermissionMap,
}

/// Changes to an existing role. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct RoleChanges {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<PermissionMap>,
}

#[derive(FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    display_name: String,
    description: Option<String>,
    permissions: serde_json::Value,
    is_system_role: bool,
    can_be_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRow {
    fn try_into_role(self) -> Result<Role, sqlx::Error> {
        let permissions = PermissionMap::from_json(&self.permissions).map_err(|e| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("role '{}' has invalid permissions: {}", self.name, e),
            )))
        })?;
        Ok(Role {
            id: RoleId::from_uuid(self.id),
            name: self.name,
            display_name: self.display_name,
            description: self.description,
            permissions,
            is_system_role: self.is_system_role,
            can_be_deleted: self.can_be_deleted,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const ROLE_COLUMNS: &str = "id, name, display_name, description, permissions, is_system_role, \
                            can_be_deleted, created_at, updated_at";

/// Repository for roles and assignments.
pub struct RoleRepository {
    pool: PgPool,
}

impl RoleRepository {
    /// Creates a new role repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lists every role by name.
    pub async fn list(&self) -> Result<Vec<Role>, sqlx::Error> {
        let rows: Vec<RoleRow> =
            sqlx::query_as(&format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY name"))
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(RoleRow::try_into_role).collect()
    }

    /// Finds a role by ID.
    pub async fn find_by_id(&self, id: RoleId) -> Result<Option<Role>, sqlx::Error> {
        let row: Option<RoleRow> =
            sqlx::query_as(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        row.map(RoleRow::try_into_role).transpose()
    }

    /// Finds a role by machine key.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Role>, sqlx::Error> {
        let row: Option<RoleRow> =
            sqlx::query_as(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1"))
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        row.map(RoleRow::try_into_role).transpose()
    }

    /// Creates a custom (non-system) role.
    pub async fn create(&self, new: &NewRole) -> Result<Role, sqlx::Error> {
        let row: RoleRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO roles (id, name, display_name, description, permissions,
                               is_system_role, can_be_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, TRUE, NOW(), NOW())
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(RoleId::new().as_uuid())
        .bind(&new.name)
        .bind(&new.display_name)
        .bind(&new.description)
        .bind(new.permissions.to_json())
        .fetch_one(&self.pool)
        .await?;
        row.try_into_role()
    }

    /// Applies `changes` to the role with `id`.
    pub async fn update(&self, id: RoleId, changes: &RoleChanges) -> Result<Option<Role>, sqlx::Error> {
        let row: Option<RoleRow> = sqlx::query_as(&format!(
            r#"
            UPDATE roles
            SET name = COALESCE($2, name),
                display_name = COALESCE($3, display_name),
                description = COALESCE($4, description),
                permissions = COALESCE($5, permissions),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(&changes.name)
        .bind(&changes.display_name)
        .bind(&changes.description)
        .bind(changes.permissions.as_ref().map(PermissionMap::to_json))
        .fetch_optional(&self.pool)
        .await?;
        row.map(RoleRow::try_into_role).transpose()
    }

    /// Deletes a role. Assignments go with it.
    pub async fn delete(&self, id: RoleId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Assigns `role_id` to `user_id`. Returns false if it was already assigned.
    pub async fn assign(
        &self,
        user_id: UserId,
        role_id: RoleId,
        assigned_by: UserId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id, assigned_by, assigned_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, role_id) DO NOTHING
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .bind(assigned_by.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes `role_id` from `user_id`. Returns false if it was not assigned.
    pub async fn unassign(&self, user_id: UserId, role_id: RoleId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id.as_uuid())
            .bind(role_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_are_machine_keys() {
        assert!(is_valid_role_name("abogado"));
        assert!(is_valid_role_name("socio_senior_2"));
        assert!(!is_valid_role_name(""));
        assert!(!is_valid_role_name("Abogado"));
        assert!(!is_valid_role_name("socio senior"));
        assert!(!is_valid_role_name("socio-senior"));
    }

    #[test]
    fn system_roles_are_never_deletable() {
        let now = Utc::now();
        let mut role = Role {
            id: RoleId::new(),
            name: "admin".to_string(),
            display_name: "Administrador".to_string(),
            description: None,
            permissions: PermissionMap::new(),
            is_system_role: true,
            can_be_deleted: true,
            created_at: now,
            updated_at: now,
        };
        assert!(!role.is_deletable());

        role.is_system_role = false;
        assert!(role.is_deletable());

        role.can_be_deleted = false;
        assert!(!role.is_deletable());
    }
}
