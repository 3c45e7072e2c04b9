//! Applies the policy table to a live database.
//!
//! Every statement runs on its own. A failing statement is logged and
//! recorded, and the remaining statements still run. Every `CREATE POLICY`
//! is preceded by `DROP POLICY IF EXISTS`, so the plan can be re-run.

use crate::error::RlsError;
use crate::ident::Ident;
use crate::policy::{PolicySpec, disable_rls_sql, enable_rls_sql, force_rls_sql};
use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

/// Runs one DDL statement.
#[async_trait]
pub trait DdlExecutor: Send + Sync {
    /// Executes `sql` outside any caller transaction.
    async fn execute_ddl(&self, sql: &str) -> Result<(), RlsError>;
}

#[async_trait]
impl DdlExecutor for PgPool {
    async fn execute_ddl(&self, sql: &str) -> Result<(), RlsError> {
        sqlx::raw_sql(sql)
            .execute(self)
            .await
            .map_err(|e| RlsError::StatementFailed {
                details: e.to_string(),
            })?;
        Ok(())
    }
}

/// A statement that failed during synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementFailure {
    /// The statement text.
    pub statement: String,
    /// Error details.
    pub error: String,
}

/// Outcome of a synchronization run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Statements that succeeded, in execution order.
    pub applied: Vec<String>,
    /// Statements that failed, in execution order.
    pub failures: Vec<StatementFailure>,
}

impl SyncReport {
    /// Returns true if every statement succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

fn distinct_tables(policies: &[PolicySpec]) -> Vec<&Ident> {
    let mut tables: Vec<&Ident> = Vec::new();
    for policy in policies {
        if !tables.contains(&policy.table()) {
            tables.push(policy.table());
        }
    }
    tables
}

/// Orders the statements that install `policies`.
///
/// Tables get RLS enabled (and optionally forced) first, then each policy is
/// dropped and recreated.
#[must_use]
pub fn apply_plan(policies: &[PolicySpec], force: bool) -> Vec<String> {
    let mut plan = Vec::new();
    for table in distinct_tables(policies) {
        plan.push(enable_rls_sql(table));
        if force {
            plan.push(force_rls_sql(table));
        }
    }
    for policy in policies {
        plan.push(policy.drop_sql());
        plan.push(policy.create_sql());
    }
    plan
}

/// Orders the statements that remove `policies` and disable RLS on their tables.
#[must_use]
pub fn teardown_plan(policies: &[PolicySpec]) -> Vec<String> {
    let mut plan: Vec<String> = policies.iter().map(PolicySpec::drop_sql).collect();
    plan.extend(distinct_tables(policies).into_iter().map(disable_rls_sql));
    plan
}

/// Installs or removes a policy table.
pub struct Synchronizer<E> {
    executor: E,
    force: bool,
}

impl<E: DdlExecutor> Synchronizer<E> {
    /// Creates a synchronizer that runs statements through `executor`.
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            force: false,
        }
    }

    /// Also issues `FORCE ROW LEVEL SECURITY` so the table owner is bound.
    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Drops and recreates every policy, enabling RLS on each table first.
    #[instrument(skip_all, fields(policies = policies.len(), force = self.force))]
    pub async fn apply(&self, policies: &[PolicySpec]) -> SyncReport {
        let report = self.run(apply_plan(policies, self.force)).await;
        info!(
            applied = report.applied.len(),
            failed = report.failures.len(),
            "row-level security policies synchronized"
        );
        report
    }

    /// Drops every policy and disables RLS on the affected tables.
    #[instrument(skip_all, fields(policies = policies.len()))]
    pub async fn teardown(&self, policies: &[PolicySpec]) -> SyncReport {
        let report = self.run(teardown_plan(policies)).await;
        info!(
            applied = report.applied.len(),
            failed = report.failures.len(),
            "row-level security policies removed"
        );
        report
    }

    async fn run(&self, plan: Vec<String>) -> SyncReport {
        let mut report = SyncReport::default();
        for statement in plan {
            match self.executor.execute_ddl(&statement).await {
                Ok(()) => report.applied.push(statement),
                Err(e) => {
                    warn!(statement = %statement, error = %e, "policy statement failed, continuing");
                    report.failures.push(StatementFailure {
                        statement,
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }
}
