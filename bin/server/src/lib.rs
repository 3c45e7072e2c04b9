//! lexcase access-control server.
//!
//! Serves the admin API for roles, direct permissions, resource shares,
//! the audit trail and row-level security maintenance. Every request is
//! resolved to a user by the session extractors in [`auth`] before any
//! handler runs.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;
