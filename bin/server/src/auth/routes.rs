//! Session routes: logout and the current-user summary.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use lexcase_audit::AuditAction;
use lexcase_core::UserId;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use super::{
    db::SessionRepository,
    middleware::{ClientContext, RequireAuth},
};
use crate::error::ApiError;
use crate::state::AppState;

/// Ends the current session.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    RequireAuth(current): RequireAuth,
    ClientContext(ctx): ClientContext,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    SessionRepository::new(state.db_pool.clone())
        .delete(current.session().id())
        .await?;

    state
        .audit
        .log_auth_operation(
            Some(current.user()),
            AuditAction::Logout,
            Some(current.user().email()),
            json!({}),
            &ctx,
        )
        .await;

    let cookie = Cookie::build(state.config.session.cookie_name.clone()).path("/");
    Ok((jar.remove(cookie), StatusCode::NO_CONTENT))
}

/// Response body for `GET /auth/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: UserId,
    pub email: String,
    pub is_super_admin: bool,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub revoked: Vec<String>,
}

/// Returns the acting user with roles and effective permissions.
pub async fn me(
    State(state): State<Arc<AppState>>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<MeResponse>, ApiError> {
    let snapshot = state
        .authorizer
        .snapshot(current.user())
        .await
        .map_err(ApiError::internal)?;
    let effective = snapshot.effective_permissions();
    // Super-admin snapshots carry no grants; list their roles separately.
    let roles = if snapshot.is_super_admin() {
        state
            .authorizer
            .role_names(current.user())
            .await
            .map_err(ApiError::internal)?
    } else {
        snapshot.role_names().map(str::to_string).collect()
    };

    Ok(Json(MeResponse {
        id: current.user_id(),
        email: current.user().email().to_string(),
        is_super_admin: effective.super_admin,
        roles,
        permissions: effective.granted.into_iter().collect(),
        revoked: effective.revoked.into_iter().collect(),
    }))
}
