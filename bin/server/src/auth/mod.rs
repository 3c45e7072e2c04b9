//! Session resolution for the lexcase server.
//!
//! Sessions are issued by the identity layer in front of this service and
//! stored in the `sessions` table. Every request presents its token either
//! as the session cookie or as `Authorization: Bearer <token>`; the
//! extractors here resolve it to a [`CurrentUser`](lexcase_access::CurrentUser)
//! or reject the request before any permission check runs.

pub mod db;
pub mod middleware;
pub mod routes;

pub use middleware::{ClientContext, RequireAuth, RequireSuperAdmin};
pub use routes::{logout, me};
