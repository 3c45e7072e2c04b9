//! Append-only audit trail for lexcase.
//!
//! Every privileged mutation (role, permission and share changes, plus
//! authentication events) is recorded as one immutable `audit_logs` row.
//! Recording is best-effort: the guarded operation has already happened and
//! must not be failed by a lost audit row.
//!
//! # Example
//!
//! ```
//! use lexcase_audit::{AuditAction, AuditEvent, RequestContext};
//! use serde_json::json;
//!
//! let ctx = RequestContext::from_headers(Some("198.51.100.4, 10.0.0.2"), Some("lexcase-cli"));
//! let event = AuditEvent::new(AuditAction::Create, "expediente")
//!     .resource_id("42")
//!     .details(json!({ "title": "Ruiz v. Castro" }));
//!
//! assert_eq!(ctx.ip_address.as_deref(), Some("198.51.100.4"));
//! assert_eq!(event.action.as_str(), "CREATE");
//! ```

mod action;
mod entry;
mod error;
mod logger;

pub use action::AuditAction;
pub use entry::{
    AuditEvent, AuditFilters, AuditLogEntry, AuditStats, CountBy, RequestContext, merge_details,
};
pub use error::AuditError;
pub use logger::{AuditLogger, AuditSettings};
