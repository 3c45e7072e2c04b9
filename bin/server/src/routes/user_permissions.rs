//! Direct permission administration.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use lexcase_access::AuthorizationError;
use lexcase_audit::AuditAction;
use lexcase_authz::PermissionKey;
use lexcase_core::{UserId, UserPermissionId};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::{ClientContext, RequireAuth, RequireSuperAdmin, db::UserRepository};
use crate::db::{UserPermission, UserPermissionRepository};
use crate::error::ApiError;
use crate::state::AppState;

/// Query of `GET /user-permissions`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: UserId,
}

/// Body of `POST /user-permissions`.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub user_id: UserId,
    pub permission_key: String,
    pub scope: Option<serde_json::Value>,
}

/// Body of `PUT /user-permissions/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub granted: Option<bool>,
    pub scope: Option<serde_json::Value>,
}

fn validate_scope(scope: Option<&serde_json::Value>) -> Result<(), ApiError> {
    match scope {
        Some(value) if !value.is_object() => {
            Err(ApiError::bad_request("scope must be a JSON object"))
        }
        _ => Ok(()),
    }
}

/// `GET /user-permissions?user_id=`
///
/// Super admins may list anyone; other users only themselves.
pub async fn list_user_permissions(
    State(state): State<Arc<AppState>>,
    RequireAuth(current): RequireAuth,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<UserPermission>>, ApiError> {
    if !current.is_super_admin() && !current.is(query.user_id) {
        return Err(AuthorizationError::PermissionDenied {
            user_id: current.user_id(),
            action: "read".to_string(),
            resource: format!("user_permissions:{}", query.user_id),
        }
        .into());
    }
    let permissions = UserPermissionRepository::new(state.db_pool.clone())
        .list_for_user(query.user_id)
        .await?;
    Ok(Json(permissions))
}

/// `POST /user-permissions`
pub async fn grant_user_permission(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    ClientContext(ctx): ClientContext,
    Json(body): Json<GrantRequest>,
) -> Result<(StatusCode, Json<UserPermission>), ApiError> {
    let key = body
        .permission_key
        .parse::<PermissionKey>()
        .map_err(ApiError::bad_request)?;
    validate_scope(body.scope.as_ref())?;

    if !UserRepository::new(state.db_pool.clone())
        .exists(body.user_id)
        .await?
    {
        return Err(ApiError::NotFound);
    }

    let permission = UserPermissionRepository::new(state.db_pool.clone())
        .grant(body.user_id, &key, body.scope.as_ref(), admin.user_id())
        .await?;

    state
        .audit
        .log_user_permission_operation(
            admin.user(),
            AuditAction::GrantPermission,
            body.user_id,
            &key.to_string(),
            json!({ "scope": body.scope }),
            &ctx,
        )
        .await;

    Ok((StatusCode::CREATED, Json(permission)))
}

/// `PUT /user-permissions/{id}`
pub async fn update_user_permission(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    ClientContext(ctx): ClientContext,
    Path(id): Path<UserPermissionId>,
    Json(body): Json<UpdateRequest>,
) -> Result<Json<UserPermission>, ApiError> {
    validate_scope(body.scope.as_ref())?;

    let permission = UserPermissionRepository::new(state.db_pool.clone())
        .update(id, body.granted, body.scope.as_ref(), admin.user_id())
        .await?
        .ok_or(ApiError::NotFound)?;

    let action = match body.granted {
        Some(true) => AuditAction::GrantPermission,
        Some(false) => AuditAction::RevokePermission,
        None => AuditAction::Update,
    };
    state
        .audit
        .log_user_permission_operation(
            admin.user(),
            action,
            permission.user_id,
            &permission.permission_key.to_string(),
            json!({ "granted": permission.granted, "scope": permission.scope }),
            &ctx,
        )
        .await;

    Ok(Json(permission))
}

/// `DELETE /user-permissions/{id}`
///
/// Soft revoke: the row is kept with `granted = false`.
pub async fn revoke_user_permission(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    ClientContext(ctx): ClientContext,
    Path(id): Path<UserPermissionId>,
) -> Result<Json<UserPermission>, ApiError> {
    let permission = UserPermissionRepository::new(state.db_pool.clone())
        .revoke(id, admin.user_id())
        .await?
        .ok_or(ApiError::NotFound)?;

    state
        .audit
        .log_user_permission_operation(
            admin.user(),
            AuditAction::RevokePermission,
            permission.user_id,
            &permission.permission_key.to_string(),
            json!({}),
            &ctx,
        )
        .await;

    Ok(Json(permission))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_must_be_an_object() {
        assert!(validate_scope(None).is_ok());
        assert!(validate_scope(Some(&json!({ "office": "madrid" }))).is_ok());
        assert!(matches!(
            validate_scope(Some(&json!(["madrid"]))),
            Err(ApiError::BadRequest { .. })
        ));
    }
}
