//! Resource share administration.
//!
//! Only a super admin or the owner of the resource may manage its shares.
//! Everyone else gets 404, the same answer as for a resource that does not
//! exist.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use lexcase_access::{AuthorizationError, CurrentUser};
use lexcase_audit::AuditAction;
use lexcase_authz::{AccessLevel, ResourceRef, ResourceShare, ResourceType};
use lexcase_core::UserId;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::auth::{ClientContext, RequireAuth, db::UserRepository};
use crate::error::ApiError;
use crate::state::AppState;

/// Identifies a resource instance in query strings.
#[derive(Debug, Deserialize)]
pub struct ResourceQuery {
    pub resource_type: String,
    pub resource_id: String,
}

/// Query of `DELETE /admin/shares`.
#[derive(Debug, Deserialize)]
pub struct UnshareQuery {
    pub resource_type: String,
    pub resource_id: String,
    pub target_user_id: UserId,
}

/// Body of `POST /admin/shares`.
#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub resource_type: String,
    pub resource_id: String,
    pub target_user_id: UserId,
    pub access: AccessLevel,
}

fn resource_ref(resource_type: &str, resource_id: &str) -> Result<ResourceRef, ApiError> {
    let resource_type = resource_type
        .parse::<ResourceType>()
        .map_err(ApiError::bad_request)?;
    let resource_id = resource_id.trim();
    if resource_id.is_empty() {
        return Err(ApiError::bad_request("resource_id must not be empty"));
    }
    Ok(ResourceRef::new(resource_type, resource_id))
}

/// Fails with 404 unless `current` may manage shares of `resource`.
async fn ensure_manager(
    state: &AppState,
    current: &CurrentUser,
    resource: &ResourceRef,
) -> Result<(), ApiError> {
    let owner = state
        .shares
        .owner_of(resource)
        .await
        .map_err(ApiError::internal)?;
    match owner {
        Some(owner) if current.is_super_admin() || current.is(owner) => Ok(()),
        _ => Err(AuthorizationError::NotFound {
            resource: resource.to_string(),
        }
        .into()),
    }
}

/// `GET /admin/shares?resource_type=&resource_id=`
pub async fn list_shares(
    State(state): State<Arc<AppState>>,
    RequireAuth(current): RequireAuth,
    Query(query): Query<ResourceQuery>,
) -> Result<Json<Vec<ResourceShare>>, ApiError> {
    let resource = resource_ref(&query.resource_type, &query.resource_id)?;
    ensure_manager(&state, &current, &resource).await?;

    let shares = state
        .shares
        .list_for_resource(&resource)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(shares))
}

/// `POST /admin/shares`
pub async fn share_resource(
    State(state): State<Arc<AppState>>,
    RequireAuth(current): RequireAuth,
    ClientContext(ctx): ClientContext,
    Json(body): Json<ShareRequest>,
) -> Result<(StatusCode, Json<ResourceShare>), ApiError> {
    let resource = resource_ref(&body.resource_type, &body.resource_id)?;
    ensure_manager(&state, &current, &resource).await?;

    if !UserRepository::new(state.db_pool.clone())
        .exists(body.target_user_id)
        .await?
    {
        return Err(ApiError::NotFound);
    }

    let share = state
        .shares
        .grant(
            &resource,
            body.target_user_id,
            body.access,
            Some(current.user_id()),
        )
        .await
        .map_err(ApiError::internal)?;

    info!(resource = %resource, target = %body.target_user_id, access = %body.access, "resource shared");
    state
        .audit
        .log_share_operation(
            current.user(),
            AuditAction::Share,
            &resource,
            body.target_user_id,
            Some(body.access),
            &ctx,
        )
        .await;

    Ok((StatusCode::CREATED, Json(share)))
}

/// `DELETE /admin/shares?resource_type=&resource_id=&target_user_id=`
pub async fn unshare_resource(
    State(state): State<Arc<AppState>>,
    RequireAuth(current): RequireAuth,
    ClientContext(ctx): ClientContext,
    Query(query): Query<UnshareQuery>,
) -> Result<StatusCode, ApiError> {
    let resource = resource_ref(&query.resource_type, &query.resource_id)?;
    ensure_manager(&state, &current, &resource).await?;

    let removed = state
        .shares
        .revoke(&resource, query.target_user_id)
        .await
        .map_err(ApiError::internal)?;
    if !removed {
        return Err(ApiError::NotFound);
    }

    info!(resource = %resource, target = %query.target_user_id, "share revoked");
    state
        .audit
        .log_share_operation(
            current.user(),
            AuditAction::Unshare,
            &resource,
            query.target_user_id,
            None,
            &ctx,
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_refs_accept_table_aliases() {
        let resource = resource_ref("expedientes", " 42 ").expect("valid");
        assert_eq!(resource.resource_type, ResourceType::Expediente);
        assert_eq!(resource.resource_id, "42");
    }

    #[test]
    fn unknown_types_and_blank_ids_are_bad_requests() {
        assert!(matches!(
            resource_ref("facturas", "1"),
            Err(ApiError::BadRequest { .. })
        ));
        assert!(matches!(
            resource_ref("document", "  "),
            Err(ApiError::BadRequest { .. })
        ));
    }
}
