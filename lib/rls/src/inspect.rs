//! Reads installed policies back from the catalog and compares them.

use crate::error::RlsError;
use crate::policy::PolicySpec;
use crate::predicate::Predicate;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::instrument;

/// A policy as reported by `pg_policies`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct InstalledPolicy {
    /// Protected table.
    pub table_name: String,
    /// Policy name.
    pub policy_name: String,
    /// `ALL`, `SELECT`, `INSERT`, `UPDATE`, or `DELETE`.
    pub command: String,
    /// Roles the policy applies to (`{public}` when unrestricted).
    pub roles: Vec<String>,
    /// `USING` expression as deparsed by Postgres.
    pub using_expr: Option<String>,
    /// `WITH CHECK` expression as deparsed by Postgres.
    pub check_expr: Option<String>,
}

fn catalog_failed(e: sqlx::Error) -> RlsError {
    RlsError::CatalogQueryFailed {
        details: e.to_string(),
    }
}

/// Lists policies in the current schema, optionally for one table.
#[instrument(skip(pool))]
pub async fn list_policies(
    pool: &PgPool,
    table: Option<&str>,
) -> Result<Vec<InstalledPolicy>, RlsError> {
    sqlx::query_as(
        r#"
        SELECT tablename::text AS table_name,
               policyname::text AS policy_name,
               cmd AS command,
               roles::text[] AS roles,
               qual AS using_expr,
               with_check AS check_expr
        FROM pg_policies
        WHERE schemaname = current_schema()
          AND ($1::text IS NULL OR tablename = $1)
        ORDER BY tablename, policyname
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(catalog_failed)
}

/// Returns whether RLS is enabled on `table`, or `None` if the table does not exist.
pub async fn rls_enabled(pool: &PgPool, table: &str) -> Result<Option<bool>, RlsError> {
    sqlx::query_scalar(
        r#"
        SELECT c.relrowsecurity
        FROM pg_class c
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = current_schema() AND c.relname = $1
        "#,
    )
    .bind(table)
    .fetch_optional(pool)
    .await
    .map_err(catalog_failed)
}

/// An installed policy whose command differs from the declared one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandMismatch {
    /// Protected table.
    pub table_name: String,
    /// Policy name.
    pub policy_name: String,
    /// Declared command.
    pub expected: String,
    /// Installed command.
    pub actual: String,
}

/// An installed policy bound to different roles than declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleMismatch {
    /// Protected table.
    pub table_name: String,
    /// Policy name.
    pub policy_name: String,
    /// Declared roles, sorted; `public` when unrestricted.
    pub expected: Vec<String>,
    /// Installed roles, sorted.
    pub actual: Vec<String>,
}

/// An installed `USING` or `WITH CHECK` clause that no longer matches the
/// declared predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpressionDrift {
    /// Protected table.
    pub table_name: String,
    /// Policy name.
    pub policy_name: String,
    /// `USING` or `WITH CHECK`.
    pub clause: &'static str,
    /// Declared fragments absent from the installed expression. Empty when
    /// the clause is present on only one side.
    pub missing: Vec<String>,
    /// The installed expression.
    pub actual: Option<String>,
}

/// Differences between the declared policy table and the database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Declared policies that are not installed, as `table.policy`.
    pub missing: Vec<String>,
    /// Installed policies with the wrong command.
    pub command_mismatches: Vec<CommandMismatch>,
    /// Installed policies bound to the wrong roles.
    pub role_mismatches: Vec<RoleMismatch>,
    /// Installed policies whose expressions drifted.
    pub expression_drift: Vec<ExpressionDrift>,
    /// Installed policies on managed tables that are not declared, as `table.policy`.
    pub unexpected: Vec<String>,
    /// Managed tables with RLS disabled.
    pub tables_without_rls: Vec<String>,
}

impl VerificationReport {
    /// Returns true if the database matches the declared policies.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
            && self.command_mismatches.is_empty()
            && self.role_mismatches.is_empty()
            && self.expression_drift.is_empty()
            && self.unexpected.is_empty()
            && self.tables_without_rls.is_empty()
    }
}

fn declared_roles(spec: &PolicySpec) -> Vec<String> {
    let mut roles: Vec<String> = spec.roles().iter().map(ToString::to_string).collect();
    if roles.is_empty() {
        roles.push("public".to_string());
    }
    roles.sort();
    roles
}

fn clause_drift(
    installed: &InstalledPolicy,
    clause: &'static str,
    declared: Option<&Predicate>,
    actual: Option<&String>,
) -> Option<ExpressionDrift> {
    let missing = match (declared, actual) {
        (None, None) => return None,
        (Some(predicate), Some(text)) => {
            let missing: Vec<String> = predicate
                .markers()
                .into_iter()
                .filter(|marker| !text.contains(marker.as_str()))
                .collect();
            if missing.is_empty() {
                return None;
            }
            missing
        }
        _ => Vec::new(),
    };
    Some(ExpressionDrift {
        table_name: installed.table_name.clone(),
        policy_name: installed.policy_name.clone(),
        clause,
        missing,
        actual: actual.cloned(),
    })
}

/// Compares declared and installed policies without touching the database.
///
/// Expressions are matched by [`Predicate::markers`]: every declared
/// fragment must appear in the deparsed text Postgres reports.
#[must_use]
pub fn compare(expected: &[PolicySpec], installed: &[InstalledPolicy]) -> VerificationReport {
    let mut report = VerificationReport::default();

    for spec in expected {
        let found = installed.iter().find(|p| {
            p.table_name == spec.table().as_str() && p.policy_name == spec.name().as_str()
        });
        let Some(p) = found else {
            report
                .missing
                .push(format!("{}.{}", spec.table(), spec.name()));
            continue;
        };

        if p.command != spec.command().as_sql() {
            report.command_mismatches.push(CommandMismatch {
                table_name: p.table_name.clone(),
                policy_name: p.policy_name.clone(),
                expected: spec.command().as_sql().to_string(),
                actual: p.command.clone(),
            });
        }

        let expected_roles = declared_roles(spec);
        let mut actual_roles = p.roles.clone();
        actual_roles.sort();
        if actual_roles != expected_roles {
            report.role_mismatches.push(RoleMismatch {
                table_name: p.table_name.clone(),
                policy_name: p.policy_name.clone(),
                expected: expected_roles,
                actual: actual_roles,
            });
        }

        report.expression_drift.extend(clause_drift(
            p,
            "USING",
            Some(spec.using()),
            p.using_expr.as_ref(),
        ));
        report.expression_drift.extend(clause_drift(
            p,
            "WITH CHECK",
            spec.check(),
            p.check_expr.as_ref(),
        ));
    }

    for p in installed {
        let managed = expected.iter().any(|s| s.table().as_str() == p.table_name);
        let declared = expected.iter().any(|s| {
            s.table().as_str() == p.table_name && s.name().as_str() == p.policy_name
        });
        if managed && !declared {
            report
                .unexpected
                .push(format!("{}.{}", p.table_name, p.policy_name));
        }
    }

    report
}

/// Checks the database against the declared policies.
#[instrument(skip_all, fields(policies = expected.len()))]
pub async fn verify(pool: &PgPool, expected: &[PolicySpec]) -> Result<VerificationReport, RlsError> {
    let installed = list_policies(pool, None).await?;
    let mut report = compare(expected, &installed);

    let mut tables: Vec<&str> = expected.iter().map(|s| s.table().as_str()).collect();
    tables.sort_unstable();
    tables.dedup();
    for table in tables {
        if rls_enabled(pool, table).await? != Some(true) {
            report.tables_without_rls.push(table.to_string());
        }
    }
    Ok(report)
}
