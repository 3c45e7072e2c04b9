//! Audit trail read endpoints. Super admin only.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use lexcase_audit::{AuditAction, AuditFilters, AuditLogEntry, AuditStats};
use lexcase_core::UserId;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::RequireSuperAdmin;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_STATS_DAYS: i32 = 30;

/// Query of `GET /admin/audit/logs`.
#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub user_id: Option<UserId>,
    pub action: Option<AuditAction>,
    pub resource_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl LogsQuery {
    fn filters(&self) -> Result<AuditFilters, ApiError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(ApiError::bad_request("'from' must not be after 'to'"));
            }
        }
        Ok(AuditFilters {
            user_id: self.user_id,
            action: self.action.clone(),
            resource_type: self.resource_type.clone(),
            from: self.from,
            to: self.to,
        })
    }
}

/// Query of `GET /admin/audit/stats`.
#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub days: Option<i32>,
}

impl StatsQuery {
    fn days(&self) -> Result<i32, ApiError> {
        match self.days {
            None => Ok(DEFAULT_STATS_DAYS),
            Some(days) if days >= 1 => Ok(days),
            Some(days) => Err(ApiError::bad_request(format!(
                "days must be positive, got {days}"
            ))),
        }
    }
}

/// `GET /admin/audit/logs`
pub async fn audit_logs(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(_admin): RequireSuperAdmin,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<AuditLogEntry>>, ApiError> {
    let filters = query.filters()?;
    let logs = state
        .audit
        .get_audit_logs(query.limit, query.offset.unwrap_or(0), &filters)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(logs))
}

/// `GET /admin/audit/stats?days=`
pub async fn audit_stats(
    State(state): State<Arc<AppState>>,
    RequireSuperAdmin(_admin): RequireSuperAdmin,
    Query(query): Query<StatsQuery>,
) -> Result<Json<AuditStats>, ApiError> {
    let days = query.days()?;
    let stats = state
        .audit
        .get_audit_stats(days)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn stats_window_defaults_to_thirty_days() {
        assert_eq!(StatsQuery::default().days().expect("default"), 30);
        assert_eq!(StatsQuery { days: Some(7) }.days().expect("seven"), 7);
        assert!(matches!(
            StatsQuery { days: Some(0) }.days(),
            Err(ApiError::BadRequest { .. })
        ));
    }

    #[test]
    fn inverted_time_range_is_rejected() {
        let now = Utc::now();
        let query = LogsQuery {
            from: Some(now),
            to: Some(now - Duration::hours(1)),
            ..LogsQuery::default()
        };
        assert!(matches!(query.filters(), Err(ApiError::BadRequest { .. })));
    }

    #[test]
    fn filters_carry_every_field() {
        let user = UserId::new();
        let query = LogsQuery {
            user_id: Some(user),
            action: Some(AuditAction::Share),
            resource_type: Some("expediente".to_string()),
            ..LogsQuery::default()
        };
        let filters = query.filters().expect("valid");
        assert_eq!(filters.user_id, Some(user));
        assert_eq!(filters.action, Some(AuditAction::Share));
        assert_eq!(filters.resource_type.as_deref(), Some("expediente"));
    }
}
