//! Role administration.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use lexcase_audit::AuditAction;
use lexcase_authz::PermissionMap;
use lexcase_core::{RoleId, UserId};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::auth::{ClientContext, RequireSuperAdmin, db::UserRepository};
use crate::db::{NewRole, Role, RoleChanges, RoleRepository, is_valid_role_name};
use crate::error::ApiError;
use crate::state::AppState;

/// Body of `POST /roles`.
#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<serde_json::Value>,
}

/// Body of `PUT /roles/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<serde_json::Value>,
}

/// Body of `POST /roles/{id}/users`.
#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub user_id: UserId,
}

fn parse_permissions(value: Option<&serde_json::Value>) -> Result<Option<PermissionMap>, ApiError> {
    value
        .map(PermissionMap::from_json)
        .transpose()
        .map_err(ApiError::bad_request)
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if is_valid_role_name(name) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "role name '{name}' must match [a-z0-9_]+"
        )))
    }
}

fn conflict_on_duplicate(e: sqlx::Error, name: &str) -> ApiError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::Conflict {
            details: format!("role '{name}' already exists"),
        },
        _ => ApiError::from(e),
    }
}

async fn load_role(state: &AppState, id: RoleId) -> Result<Role, ApiError> {
    RoleRepository::new(state.db_pool.clone())
        .find_by_id(id)
        .await?
        .ok_or(ApiError::NotFound)
}

/// `GET /roles`
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(_admin): RequireSuperAdmin,
) -> Result<Json<Vec<Role>>, ApiError> {
    let roles = RoleRepository::new(state.db_pool.clone()).list().await?;
    Ok(Json(roles))
}

/// `GET /roles/{id}`
pub async fn get_role(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(_admin): RequireSuperAdmin,
    Path(id): Path<RoleId>,
) -> Result<Json<Role>, ApiError> {
    Ok(Json(load_role(&state, id).await?))
}

/// `POST /roles`
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    ClientContext(ctx): ClientContext,
    Json(body): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    validate_name(&body.name)?;
    let permissions = parse_permissions(body.permissions.as_ref())?.unwrap_or_default();

    let new = NewRole {
        display_name: body.display_name.unwrap_or_else(|| body.name.clone()),
        name: body.name,
        description: body.description,
        permissions,
    };
    let role = RoleRepository::new(state.db_pool.clone())
        .create(&new)
        .await
        .map_err(|e| conflict_on_duplicate(e, &new.name))?;

    info!(role = %role.name, "role created");
    state
        .audit
        .log_role_operation(
            admin.user(),
            AuditAction::Create,
            role.id,
            &role.name,
            json!({ "permissions": role.permissions }),
            &ctx,
        )
        .await;

    Ok((StatusCode::CREATED, Json(role)))
}

/// `PUT /roles/{id}`
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    ClientContext(ctx): ClientContext,
    Path(id): Path<RoleId>,
    Json(body): Json<UpdateRoleRequest>,
) -> Result<Json<Role>, ApiError> {
    let existing = load_role(&state, id).await?;

    if existing.is_system_role && (body.name.is_some() || body.permissions.is_some()) {
        return Err(ApiError::Conflict {
            details: format!(
                "system role '{}' cannot change name or permissions",
                existing.name
            ),
        });
    }
    if let Some(name) = &body.name {
        validate_name(name)?;
    }

    let changes = RoleChanges {
        permissions: parse_permissions(body.permissions.as_ref())?,
        name: body.name,
        display_name: body.display_name,
        description: body.description,
    };
    let changed_fields: Vec<&str> = [
        ("name", changes.name.is_some()),
        ("display_name", changes.display_name.is_some()),
        ("description", changes.description.is_some()),
        ("permissions", changes.permissions.is_some()),
    ]
    .into_iter()
    .filter_map(|(field, set)| set.then_some(field))
    .collect();

    let role = RoleRepository::new(state.db_pool.clone())
        .update(id, &changes)
        .await
        .map_err(|e| conflict_on_duplicate(e, changes.name.as_deref().unwrap_or(&existing.name)))?
        .ok_or(ApiError::NotFound)?;

    state
        .audit
        .log_role_operation(
            admin.user(),
            AuditAction::Update,
            role.id,
            &role.name,
            json!({ "changed": changed_fields, "previous_name": existing.name }),
            &ctx,
        )
        .await;

    Ok(Json(role))
}

/// `DELETE /roles/{id}`
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    ClientContext(ctx): ClientContext,
    Path(id): Path<RoleId>,
) -> Result<StatusCode, ApiError> {
    let role = load_role(&state, id).await?;
    if !role.is_deletable() {
        return Err(ApiError::Conflict {
            details: format!("role '{}' cannot be deleted", role.name),
        });
    }

    if !RoleRepository::new(state.db_pool.clone()).delete(id).await? {
        return Err(ApiError::NotFound);
    }

    info!(role = %role.name, "role deleted");
    state
        .audit
        .log_role_operation(
            admin.user(),
            AuditAction::Delete,
            role.id,
            &role.name,
            json!({}),
            &ctx,
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// `POST /roles/{id}/users`
pub async fn assign_role(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    ClientContext(ctx): ClientContext,
    Path(id): Path<RoleId>,
    Json(body): Json<AssignRoleRequest>,
) -> Result<StatusCode, ApiError> {
    let role = load_role(&state, id).await?;
    if !UserRepository::new(state.db_pool.clone())
        .exists(body.user_id)
        .await?
    {
        return Err(ApiError::NotFound);
    }

    let newly_assigned = RoleRepository::new(state.db_pool.clone())
        .assign(body.user_id, id, admin.user_id())
        .await?;

    if newly_assigned {
        state
            .audit
            .log_role_operation(
                admin.user(),
                AuditAction::AssignRole,
                role.id,
                &role.name,
                json!({ "target_user_id": body.user_id }),
                &ctx,
            )
            .await;
        Ok(StatusCode::CREATED)
    } else {
        Ok(StatusCode::OK)
    }
}

/// `DELETE /roles/{id}/users/{user_id}`
pub async fn unassign_role(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    ClientContext(ctx): ClientContext,
    Path((id, user_id)): Path<(RoleId, UserId)>,
) -> Result<StatusCode, ApiError> {
    let role = load_role(&state, id).await?;
    if !RoleRepository::new(state.db_pool.clone())
        .unassign(user_id, id)
        .await?
    {
        return Err(ApiError::NotFound);
    }

    state
        .audit
        .log_role_operation(
            admin.user(),
            AuditAction::RemoveRole,
            role.id,
            &role.name,
            json!({ "target_user_id": user_id }),
            &ctx,
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_permission_maps_are_bad_requests() {
        let bad = json!({ "expedientes": "read" });
        assert!(matches!(
            parse_permissions(Some(&bad)),
            Err(ApiError::BadRequest { .. })
        ));
        assert!(parse_permissions(None).expect("none is fine").is_none());

        let good = json!({ "expedientes": ["read", "update"] });
        let map = parse_permissions(Some(&good)).expect("valid").expect("present");
        assert!(!map.is_empty());
    }

    #[test]
    fn role_names_are_validated() {
        assert!(validate_name("socio").is_ok());
        assert!(matches!(validate_name("Socio!"), Err(ApiError::BadRequest { .. })));
    }
}
