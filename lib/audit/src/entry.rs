//! Audit records, request context, and read-path filters.

use crate::action::AuditAction;
use chrono::{DateTime, Utc};
use lexcase_core::{AuditLogId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

/// Where a privileged request came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Client address, first hop of `X-Forwarded-For`.
    pub ip_address: Option<String>,
    /// Client `User-Agent`.
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Builds a context from raw header values.
    #[must_use]
    pub fn from_headers(forwarded_for: Option<&str>, user_agent: Option<&str>) -> Self {
        let ip_address = forwarded_for
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string);
        let user_agent = user_agent
            .map(str::trim)
            .filter(|ua| !ua.is_empty())
            .map(str::to_string);
        Self {
            ip_address,
            user_agent,
        }
    }
}

/// A privileged action about to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    /// The verb.
    pub action: AuditAction,
    /// Kind of thing acted on, e.g. `role` or `expediente`.
    pub resource_type: String,
    /// Identifier of the thing acted on.
    pub resource_id: Option<String>,
    /// Structured payload.
    pub details: Value,
}

impl AuditEvent {
    /// Creates an event with empty details.
    pub fn new(action: AuditAction, resource_type: impl Into<String>) -> Self {
        Self {
            action,
            resource_type: resource_type.into(),
            resource_id: None,
            details: Value::Object(Map::new()),
        }
    }

    /// Sets the resource identifier.
    #[must_use]
    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    /// Sets the details payload.
    #[must_use]
    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Overlays `extra` onto `base`.
///
/// Keys from `extra` win. A non-object `extra` is kept under `"data"`, and
/// `null` adds nothing.
#[must_use]
pub fn merge_details(base: Value, extra: Value) -> Value {
    let mut merged = match base {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => Map::from_iter([("data".to_string(), other)]),
    };
    match extra {
        Value::Object(map) => merged.extend(map),
        Value::Null => {}
        other => {
            merged.insert("data".to_string(), other);
        }
    }
    Value::Object(merged)
}

/// A stored audit row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogEntry {
    pub id: AuditLogId,
    pub user_id: Option<UserId>,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(FromRow)]
pub(crate) struct AuditLogRow {
    id: Uuid,
    user_id: Option<Uuid>,
    action: String,
    resource_type: String,
    resource_id: Option<String>,
    details: Value,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AuditLogRow> for AuditLogEntry {
    fn from(row: AuditLogRow) -> Self {
        Self {
            id: AuditLogId::from_uuid(row.id),
            user_id: row.user_id.map(UserId::from_uuid),
            action: AuditAction::from(row.action.as_str()),
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            details: row.details,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
        }
    }
}

/// Filters for [`crate::AuditLogger::get_audit_logs`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuditFilters {
    /// Acting user.
    pub user_id: Option<UserId>,
    /// Exact verb.
    pub action: Option<AuditAction>,
    /// Exact resource type.
    pub resource_type: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
}

/// A grouped count.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct CountBy {
    pub key: String,
    pub count: i64,
}

/// Aggregates over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditStats {
    /// Window length in days.
    pub days: i32,
    pub total_logs: i64,
    pub by_action: Vec<CountBy>,
    pub by_resource_type: Vec<CountBy>,
    /// Newest rows in the window.
    pub recent: Vec<AuditLogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn context_takes_first_forwarded_hop() {
        let ctx = RequestContext::from_headers(
            Some(" 203.0.113.7 , 10.0.0.1"),
            Some("curl/8.0"),
        );
        assert_eq!(ctx.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(ctx.user_agent.as_deref(), Some("curl/8.0"));
    }

    #[test]
    fn context_ignores_blank_headers() {
        let ctx = RequestContext::from_headers(Some("  "), Some(""));
        assert_eq!(ctx, RequestContext::default());
    }

    #[test]
    fn merge_lets_extra_win() {
        let merged = merge_details(
            json!({"role_name": "abogado", "source": "base"}),
            json!({"source": "api", "count": 2}),
        );
        assert_eq!(
            merged,
            json!({"role_name": "abogado", "source": "api", "count": 2})
        );
    }

    #[test]
    fn merge_wraps_scalars_and_skips_null() {
        assert_eq!(
            merge_details(json!({"a": 1}), json!("note")),
            json!({"a": 1, "data": "note"})
        );
        assert_eq!(merge_details(json!({"a": 1}), Value::Null), json!({"a": 1}));
    }

    #[test]
    fn event_builder() {
        let event = AuditEvent::new(AuditAction::Create, "expediente")
            .resource_id("42")
            .details(json!({"title": "Pérez v. Gómez"}));
        assert_eq!(event.resource_id.as_deref(), Some("42"));
        assert_eq!(event.details["title"], "Pérez v. Gómez");
    }
}
