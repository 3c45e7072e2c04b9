//! Row-level security maintenance endpoints. Super admin only.

use axum::{Json, extract::State};
use lexcase_audit::{AuditAction, AuditEvent};
use lexcase_rls::{SyncReport, VerificationReport, verify};
use serde_json::json;
use std::sync::Arc;

use crate::auth::{ClientContext, RequireSuperAdmin};
use crate::error::ApiError;
use crate::state::AppState;

/// `POST /admin/rls/sync`
///
/// Reinstalls every policy. Partial failures are reported, not raised.
pub async fn sync_policies(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    ClientContext(ctx): ClientContext,
) -> Result<Json<SyncReport>, ApiError> {
    let report = state.sync_policies().await.map_err(ApiError::internal)?;

    let event = AuditEvent::new(AuditAction::SyncPolicies, "rls_policy").details(json!({
        "applied": report.applied.len(),
        "failed": report.failures.len(),
        "force": state.config.rls.force,
    }));
    state.audit.log_event(Some(admin.user()), event, &ctx).await;

    Ok(Json(report))
}

/// `GET /admin/rls/verify`
pub async fn verify_policies(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(_admin): RequireSuperAdmin,
) -> Result<Json<VerificationReport>, ApiError> {
    let policies = state.policies().map_err(ApiError::internal)?;
    let report = verify(&state.db_pool, &policies)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(report))
}
