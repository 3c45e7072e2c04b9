//! Postgres-backed permission evaluator.

use crate::error::AuthzError;
use crate::evaluator::{DirectGrant, GrantSnapshot, RevocationPolicy, RoleGrant};
use crate::types::{PermissionKey, PermissionMap};
use lexcase_access::User;
use rootcause::prelude::Report;
use sqlx::{FromRow, PgPool};
use tracing::{debug, error, instrument, warn};

#[derive(FromRow)]
struct DirectGrantRow {
    permission_key: String,
    granted: bool,
    scope: Option<serde_json::Value>,
}

#[derive(FromRow)]
struct RoleGrantRow {
    name: String,
    permissions: serde_json::Value,
}

fn store_failed(e: sqlx::Error) -> AuthzError {
    AuthzError::StoreFailed {
        details: e.to_string(),
    }
}

/// Answers permission questions by loading a [`GrantSnapshot`] per call.
///
/// Every load runs in its own read-only `REPEATABLE READ` transaction so the
/// role and direct-grant tables are read from one consistent snapshot.
#[derive(Clone)]
pub struct Authorizer {
    pool: PgPool,
    policy: RevocationPolicy,
}

impl Authorizer {
    /// Creates a new authorizer.
    #[must_use]
    pub fn new(pool: PgPool, policy: RevocationPolicy) -> Self {
        Self { pool, policy }
    }

    /// Returns the configured revocation policy.
    #[must_use]
    pub fn policy(&self) -> RevocationPolicy {
        self.policy
    }

    /// Loads the grants that apply to `user`.
    ///
    /// Super admins short-circuit without touching the grant tables.
    #[instrument(skip(self, user), fields(user_id = %user.id()))]
    pub async fn snapshot(&self, user: &User) -> Result<GrantSnapshot, Report<AuthzError>> {
        if user.is_super_admin() {
            debug!("super admin, skipping grant lookup");
            return Ok(GrantSnapshot::super_admin());
        }

        let mut tx = self.pool.begin().await.map_err(store_failed)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(store_failed)?;

        let direct_rows: Vec<DirectGrantRow> = sqlx::query_as(
            r#"
            SELECT permission_key, granted, scope
            FROM user_permissions
            WHERE user_id = $1
            "#,
        )
        .bind(user.id().as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(store_failed)?;

        let role_rows: Vec<RoleGrantRow> = sqlx::query_as(
            r#"
            SELECT r.name, r.permissions
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user.id().as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(store_failed)?;

        tx.commit().await.map_err(store_failed)?;

        let direct = direct_rows
            .into_iter()
            .filter_map(|row| match row.permission_key.parse::<PermissionKey>() {
                Ok(key) => Some(DirectGrant {
                    key,
                    granted: row.granted,
                    scope: row.scope,
                }),
                Err(e) => {
                    warn!(key = %row.permission_key, error = %e, "ignoring malformed permission key");
                    None
                }
            })
            .collect();

        let roles = role_rows
            .into_iter()
            .map(|row| {
                let rules = match PermissionMap::from_json(&row.permissions) {
                    Ok(map) => map.rules(),
                    Err(e) => {
                        warn!(role = %row.name, error = %e, "role has malformed permissions, treating as empty");
                        Vec::new()
                    }
                };
                RoleGrant {
                    name: row.name,
                    rules,
                }
            })
            .collect();

        Ok(GrantSnapshot::new(direct, roles, self.policy))
    }

    /// Lists the names of the roles assigned to `user`.
    ///
    /// Unlike [`snapshot`](Self::snapshot), super admins are not
    /// short-circuited.
    pub async fn role_names(&self, user: &User) -> Result<Vec<String>, Report<AuthzError>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user.id().as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(store_failed)?;
        Ok(names)
    }

    /// Loads a snapshot, logging and denying on failure.
    async fn snapshot_or_deny(&self, user: &User) -> Option<GrantSnapshot> {
        match self.snapshot(user).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                error!(user_id = %user.id(), error = %e, "failed to load grants, denying");
                None
            }
        }
    }

    /// Checks if `user` may perform `action` on `resource`.
    #[instrument(skip(self, user), fields(user_id = %user.id()))]
    pub async fn has_permission(&self, user: &User, resource: &str, action: &str) -> bool {
        let allowed = self
            .snapshot_or_deny(user)
            .await
            .is_some_and(|s| s.has_permission(resource, action));
        debug!(allowed, "permission check result");
        allowed
    }

    /// Checks if `user` holds the role named `role_name`.
    #[instrument(skip(self, user), fields(user_id = %user.id()))]
    pub async fn has_role(&self, user: &User, role_name: &str) -> bool {
        self.snapshot_or_deny(user)
            .await
            .is_some_and(|s| s.has_role(role_name))
    }

    /// Category-level entry check.
    ///
    /// `resource_id` is accepted for call-site symmetry but does not take
    /// part in the decision; instance-level checks belong to the share
    /// registry and row-level security.
    #[instrument(skip(self, user), fields(user_id = %user.id()))]
    pub async fn user_can_access_resource(
        &self,
        user: &User,
        resource: &str,
        _resource_id: Option<&str>,
    ) -> bool {
        if resource == crate::evaluator::OWN_RESOURCE {
            return true;
        }
        self.snapshot_or_deny(user)
            .await
            .is_some_and(|s| s.can_access_resource(resource))
    }
}
