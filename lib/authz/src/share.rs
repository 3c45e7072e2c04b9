//! Per-instance access grants layered on top of ownership.
//!
//! A share gives one user `read` or `write` access to one resource instance
//! regardless of who owns it. Shares never expire; they persist until
//! revoked. The same rule is mirrored by the row-level security policies.

use crate::error::AuthzError;
use crate::types::{AccessLevel, Operation, ResourceRef, ResourceType};
use chrono::{DateTime, Utc};
use lexcase_access::User;
use lexcase_core::{ShareId, UserId};
use rootcause::prelude::Report;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

/// A stored share grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceShare {
    /// Share ID.
    pub id: ShareId,
    /// The shared instance.
    pub resource: ResourceRef,
    /// The user receiving access.
    pub target_user_id: UserId,
    /// Granted access level.
    pub access: AccessLevel,
    /// Who created or last changed the share.
    pub granted_by: Option<UserId>,
    /// When the share was created.
    pub created_at: DateTime<Utc>,
    /// When the access level last changed.
    pub updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ShareRow {
    id: Uuid,
    resource_type: String,
    resource_id: String,
    target_user_id: Uuid,
    access: String,
    granted_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShareRow {
    fn try_into_share(self) -> Result<ResourceShare, AuthzError> {
        let resource_type = self.resource_type.parse::<ResourceType>()?;
        let access = self.access.parse::<AccessLevel>()?;
        Ok(ResourceShare {
            id: ShareId::from_uuid(self.id),
            resource: ResourceRef::new(resource_type, self.resource_id),
            target_user_id: UserId::from_uuid(self.target_user_id),
            access,
            granted_by: self.granted_by.map(UserId::from_uuid),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn store_failed(e: sqlx::Error) -> AuthzError {
    AuthzError::StoreFailed {
        details: e.to_string(),
    }
}

/// Decides an instance-level operation from its three inputs.
///
/// Super admins and owners may do anything; otherwise the share's level must
/// permit the operation. Absence of a share denies.
#[must_use]
pub fn decide(
    is_super_admin: bool,
    is_owner: bool,
    share: Option<AccessLevel>,
    operation: Operation,
) -> bool {
    is_super_admin || is_owner || share.is_some_and(|level| level.permits(operation))
}

/// Returns the access levels that satisfy `operation`.
#[must_use]
pub fn levels_for(operation: Operation) -> &'static [&'static str] {
    match operation {
        Operation::Read => &["read", "write"],
        Operation::Write => &["write"],
    }
}

/// Builds the `EXISTS (...)` clause CRUD queries OR with their owner check.
///
/// `id_expr` is the SQL expression for the row's ID and `user_param` the
/// placeholder bound to the caller's user ID (e.g. `"$1"`). Both are
/// inserted verbatim and must come from trusted code, never from input.
#[must_use]
pub fn share_exists_clause(
    resource_type: ResourceType,
    id_expr: &str,
    user_param: &str,
    operation: Operation,
) -> String {
    let levels = levels_for(operation)
        .iter()
        .map(|level| format!("'{level}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "EXISTS (SELECT 1 FROM resource_shares s WHERE s.resource_type = '{}' \
         AND s.resource_id = ({id_expr})::text AND s.target_user_id = {user_param} \
         AND s.access IN ({levels}))",
        resource_type.as_str()
    )
}

/// Registry of resource shares.
#[derive(Clone)]
pub struct ShareRegistry {
    pool: PgPool,
}

impl ShareRegistry {
    /// Creates a new registry.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Grants `access` on `resource` to `target`, replacing any previous level.
    #[instrument(skip(self), fields(resource = %resource, target = %target))]
    pub async fn grant(
        &self,
        resource: &ResourceRef,
        target: UserId,
        access: AccessLevel,
        granted_by: Option<UserId>,
    ) -> Result<ResourceShare, Report<AuthzError>> {
        let row: ShareRow = sqlx::query_as(
            r#"
            INSERT INTO resource_shares
                (id, resource_type, resource_id, target_user_id, access, granted_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            ON CONFLICT (resource_type, resource_id, target_user_id)
            DO UPDATE SET access = EXCLUDED.access,
                          granted_by = EXCLUDED.granted_by,
                          updated_at = NOW()
            RETURNING id, resource_type, resource_id, target_user_id, access,
                      granted_by, created_at, updated_at
            "#,
        )
        .bind(ShareId::new().as_uuid())
        .bind(resource.resource_type.as_str())
        .bind(&resource.resource_id)
        .bind(target.as_uuid())
        .bind(access.as_str())
        .bind(granted_by.map(|id| id.as_uuid()))
        .fetch_one(&self.pool)
        .await
        .map_err(store_failed)?;

        debug!("share granted");
        Ok(row.try_into_share()?)
    }

    /// Removes the share of `resource` with `target`. Returns false if none existed.
    #[instrument(skip(self), fields(resource = %resource, target = %target))]
    pub async fn revoke(
        &self,
        resource: &ResourceRef,
        target: UserId,
    ) -> Result<bool, Report<AuthzError>> {
        let result = sqlx::query(
            r#"
            DELETE FROM resource_shares
            WHERE resource_type = $1 AND resource_id = $2 AND target_user_id = $3
            "#,
        )
        .bind(resource.resource_type.as_str())
        .bind(&resource.resource_id)
        .bind(target.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(store_failed)?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists every share of `resource`.
    pub async fn list_for_resource(
        &self,
        resource: &ResourceRef,
    ) -> Result<Vec<ResourceShare>, Report<AuthzError>> {
        let rows: Vec<ShareRow> = sqlx::query_as(
            r#"
            SELECT id, resource_type, resource_id, target_user_id, access,
                   granted_by, created_at, updated_at
            FROM resource_shares
            WHERE resource_type = $1 AND resource_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(resource.resource_type.as_str())
        .bind(&resource.resource_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_failed)?;

        let shares = rows
            .into_iter()
            .map(ShareRow::try_into_share)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(shares)
    }

    /// Returns the level `user` holds on `resource` through a share.
    pub async fn access_for(
        &self,
        resource: &ResourceRef,
        user: UserId,
    ) -> Result<Option<AccessLevel>, Report<AuthzError>> {
        let access: Option<String> = sqlx::query_scalar(
            r#"
            SELECT access
            FROM resource_shares
            WHERE resource_type = $1 AND resource_id = $2 AND target_user_id = $3
            "#,
        )
        .bind(resource.resource_type.as_str())
        .bind(&resource.resource_id)
        .bind(user.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_failed)?;

        match access {
            Some(level) => Ok(Some(level.parse::<AccessLevel>()?)),
            None => Ok(None),
        }
    }

    /// Returns the owner of `resource`, or `None` if it does not exist.
    pub async fn owner_of(
        &self,
        resource: &ResourceRef,
    ) -> Result<Option<UserId>, Report<AuthzError>> {
        // Table name comes from a closed enum, never from input.
        let sql = format!(
            "SELECT owner_id FROM {} WHERE id::text = $1",
            resource.resource_type.table()
        );
        let owner: Option<Uuid> = sqlx::query_scalar(&sql)
            .bind(&resource.resource_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_failed)?;

        Ok(owner.map(UserId::from_uuid))
    }

    /// Decides whether `user` may perform `operation` on `resource`.
    ///
    /// Missing resources deny, so callers can answer "not found" for both
    /// cases without leaking existence.
    #[instrument(skip(self, user), fields(user_id = %user.id(), resource = %resource))]
    pub async fn check(
        &self,
        user: &User,
        resource: &ResourceRef,
        operation: Operation,
    ) -> Result<bool, Report<AuthzError>> {
        if user.is_super_admin() {
            return Ok(true);
        }
        let Some(owner) = self.owner_of(resource).await? else {
            return Ok(false);
        };
        if owner == user.id() {
            return Ok(true);
        }
        let share = self.access_for(resource, user.id()).await?;
        let allowed = decide(false, false, share, operation);
        debug!(allowed, ?operation, "share check result");
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_and_super_admin_always_allowed() {
        assert!(decide(true, false, None, Operation::Write));
        assert!(decide(false, true, None, Operation::Write));
    }

    #[test]
    fn read_share_authorizes_reads_only() {
        assert!(decide(false, false, Some(AccessLevel::Read), Operation::Read));
        assert!(!decide(false, false, Some(AccessLevel::Read), Operation::Write));
    }

    #[test]
    fn write_share_authorizes_mutation() {
        assert!(decide(false, false, Some(AccessLevel::Write), Operation::Write));
        assert!(decide(false, false, Some(AccessLevel::Write), Operation::Read));
    }

    #[test]
    fn no_share_denies() {
        assert!(!decide(false, false, None, Operation::Read));
    }

    #[test]
    fn exists_clause_for_reads_accepts_both_levels() {
        let clause = share_exists_clause(ResourceType::Expediente, "e.id", "$1", Operation::Read);
        assert!(clause.starts_with("EXISTS (SELECT 1 FROM resource_shares s"));
        assert!(clause.contains("s.resource_type = 'expediente'"));
        assert!(clause.contains("s.resource_id = (e.id)::text"));
        assert!(clause.contains("s.target_user_id = $1"));
        assert!(clause.contains("s.access IN ('read', 'write')"));
    }

    #[test]
    fn exists_clause_for_writes_requires_write() {
        let clause = share_exists_clause(ResourceType::Document, "d.id", "$2", Operation::Write);
        assert!(clause.contains("s.access IN ('write')"));
        assert!(!clause.contains("'read'"));
    }
}
