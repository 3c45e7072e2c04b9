//! Postgres row-level security for lexcase.
//!
//! - [`catalog`] declares which policies protect which tables.
//! - [`Synchronizer`] installs them idempotently and best-effort.
//! - [`verify`] reads `pg_policies` back and reports drift.
//! - [`with_user_rls`] runs work in a transaction that the policies evaluate
//!   as a given user.

pub mod catalog;
mod error;
mod ident;
mod inspect;
mod policy;
mod predicate;
mod scope;
mod sync;

pub use catalog::{CatalogOptions, default_policies};
pub use error::RlsError;
pub use ident::{Ident, MAX_IDENTIFIER_LEN, quote_literal};
pub use inspect::{
    CommandMismatch, ExpressionDrift, InstalledPolicy, RoleMismatch, VerificationReport, compare,
    list_policies, rls_enabled, verify,
};
pub use policy::{PolicyCommand, PolicySpec, disable_rls_sql, enable_rls_sql, force_rls_sql};
pub use predicate::{CURRENT_USER_SETTING, Predicate, current_user_expr};
pub use scope::{RlsSession, with_user_rls};
pub use sync::{DdlExecutor, StatementFailure, SyncReport, Synchronizer, apply_plan, teardown_plan};
