//! Shared application state.

use crate::config::ServerConfig;
use lexcase_audit::AuditLogger;
use lexcase_authz::{Authorizer, ShareRegistry};
use lexcase_rls::{
    CatalogOptions, Ident, PolicySpec, RlsError, SyncReport, Synchronizer, default_policies,
};
use sqlx::PgPool;
use tracing::warn;

/// State handed to every handler behind an `Arc`.
pub struct AppState {
    /// Database connection pool.
    pub db_pool: PgPool,
    /// Permission evaluator.
    pub authorizer: Authorizer,
    /// Resource share registry.
    pub shares: ShareRegistry,
    /// Audit logger.
    pub audit: AuditLogger,
    /// Loaded configuration.
    pub config: ServerConfig,
}

impl AppState {
    /// Creates the state, wiring every component to `db_pool`.
    pub fn new(db_pool: PgPool, config: ServerConfig) -> Self {
        Self {
            authorizer: Authorizer::new(db_pool.clone(), config.authz.revocation_policy),
            shares: ShareRegistry::new(db_pool.clone()),
            audit: AuditLogger::with_settings(db_pool.clone(), config.audit),
            db_pool,
            config,
        }
    }

    /// Builds the declarative policy table from configuration.
    pub fn policies(&self) -> Result<Vec<PolicySpec>, RlsError> {
        let roles = self
            .config
            .rls
            .policy_roles
            .iter()
            .map(|role| Ident::new(role.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        default_policies(&CatalogOptions {
            roles,
            revocation_policy: self.config.authz.revocation_policy,
        })
    }

    /// Installs the policy table. Statement failures land in the report.
    pub async fn sync_policies(&self) -> Result<SyncReport, RlsError> {
        let policies = self.policies()?;
        let report = Synchronizer::new(self.db_pool.clone())
            .force(self.config.rls.force)
            .apply(&policies)
            .await;
        if !report.is_complete() {
            warn!(
                failed = report.failures.len(),
                "row-level security sync incomplete"
            );
        }
        Ok(report)
    }
}
