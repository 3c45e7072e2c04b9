//! Declarative policy descriptors and the DDL generated from them.

use crate::error::RlsError;
use crate::ident::Ident;
use crate::predicate::Predicate;
use serde::Serialize;
use std::fmt;

/// Command a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PolicyCommand {
    /// Every command.
    All,
    /// Reads.
    Select,
    /// New rows.
    Insert,
    /// Changed rows.
    Update,
    /// Removed rows.
    Delete,
}

impl PolicyCommand {
    /// Returns the keyword used in `CREATE POLICY` and reported by `pg_policies.cmd`.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    fn allows_using(&self) -> bool {
        !matches!(self, Self::Insert)
    }

    fn allows_with_check(&self) -> bool {
        matches!(self, Self::All | Self::Insert | Self::Update)
    }
}

impl fmt::Display for PolicyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One row of the declarative policy table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySpec {
    table: Ident,
    name: Ident,
    command: PolicyCommand,
    roles: Vec<Ident>,
    using: Predicate,
    with_check: Option<Predicate>,
}

impl PolicySpec {
    /// Creates a policy descriptor.
    pub fn new(
        table: Ident,
        name: Ident,
        command: PolicyCommand,
        using: Predicate,
    ) -> Result<Self, RlsError> {
        if !command.allows_using() {
            return Err(RlsError::InvalidPolicy {
                policy: name.to_string(),
                details: format!("{command} policies take WITH CHECK only"),
            });
        }
        Ok(Self {
            table,
            name,
            command,
            roles: Vec::new(),
            using,
            with_check: None,
        })
    }

    /// Adds a `WITH CHECK` condition.
    pub fn with_check(mut self, check: Predicate) -> Result<Self, RlsError> {
        if !self.command.allows_with_check() {
            return Err(RlsError::InvalidPolicy {
                policy: self.name.to_string(),
                details: format!("{} policies cannot have WITH CHECK", self.command),
            });
        }
        self.with_check = Some(check);
        Ok(self)
    }

    /// Restricts the policy to the given database roles.
    #[must_use]
    pub fn to_roles(mut self, roles: Vec<Ident>) -> Self {
        self.roles = roles;
        self
    }

    /// Returns the protected table.
    #[must_use]
    pub fn table(&self) -> &Ident {
        &self.table
    }

    /// Returns the policy name.
    #[must_use]
    pub fn name(&self) -> &Ident {
        &self.name
    }

    /// Returns the command the policy applies to.
    #[must_use]
    pub fn command(&self) -> PolicyCommand {
        self.command
    }

    /// Returns the roles the policy applies to; empty means `PUBLIC`.
    #[must_use]
    pub fn roles(&self) -> &[Ident] {
        &self.roles
    }

    /// Returns the `USING` condition.
    #[must_use]
    pub fn using(&self) -> &Predicate {
        &self.using
    }

    /// Returns the `WITH CHECK` condition, if any.
    #[must_use]
    pub fn check(&self) -> Option<&Predicate> {
        self.with_check.as_ref()
    }

    /// `DROP POLICY IF EXISTS <name> ON <table>`.
    #[must_use]
    pub fn drop_sql(&self) -> String {
        format!("DROP POLICY IF EXISTS {} ON {}", self.name, self.table)
    }

    /// `CREATE POLICY <name> ON <table> FOR <cmd> [TO <roles>] USING (...) [WITH CHECK (...)]`.
    #[must_use]
    pub fn create_sql(&self) -> String {
        let mut sql = format!(
            "CREATE POLICY {} ON {} FOR {}",
            self.name, self.table, self.command
        );
        if !self.roles.is_empty() {
            let roles = self
                .roles
                .iter()
                .map(Ident::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" TO {roles}"));
        }
        sql.push_str(&format!(" USING ({})", self.using.to_sql()));
        if let Some(check) = &self.with_check {
            sql.push_str(&format!(" WITH CHECK ({})", check.to_sql()));
        }
        sql
    }
}

/// `ALTER TABLE <table> ENABLE ROW LEVEL SECURITY`.
#[must_use]
pub fn enable_rls_sql(table: &Ident) -> String {
    format!("ALTER TABLE {table} ENABLE ROW LEVEL SECURITY")
}

/// `ALTER TABLE <table> FORCE ROW LEVEL SECURITY`, which also binds the table owner.
#[must_use]
pub fn force_rls_sql(table: &Ident) -> String {
    format!("ALTER TABLE {table} FORCE ROW LEVEL SECURITY")
}

/// `ALTER TABLE <table> DISABLE ROW LEVEL SECURITY`.
#[must_use]
pub fn disable_rls_sql(table: &Ident) -> String {
    format!("ALTER TABLE {table} DISABLE ROW LEVEL SECURITY")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> Ident {
        Ident::new(s).expect("valid ident")
    }

    fn owner() -> Predicate {
        Predicate::OwnedByCurrentUser {
            table: ident("clientes"),
            column: ident("owner_id"),
        }
    }

    #[test]
    fn create_sql_shape_without_roles() {
        let spec = PolicySpec::new(
            ident("clientes"),
            ident("clientes_select_policy"),
            PolicyCommand::Select,
            owner(),
        )
        .expect("valid spec");

        assert_eq!(
            spec.create_sql(),
            format!(
                "CREATE POLICY clientes_select_policy ON clientes FOR SELECT USING ({})",
                owner().to_sql()
            )
        );
        assert_eq!(
            spec.drop_sql(),
            "DROP POLICY IF EXISTS clientes_select_policy ON clientes"
        );
    }

    #[test]
    fn create_sql_with_roles_and_check() {
        let spec = PolicySpec::new(
            ident("clientes"),
            ident("clientes_modify_policy"),
            PolicyCommand::All,
            owner(),
        )
        .and_then(|s| s.with_check(owner()))
        .expect("valid spec")
        .to_roles(vec![ident("lexcase_app"), ident("reporting")]);

        let sql = spec.create_sql();
        assert!(sql.starts_with(
            "CREATE POLICY clientes_modify_policy ON clientes FOR ALL TO lexcase_app, reporting USING ("
        ));
        assert!(sql.ends_with(&format!("WITH CHECK ({})", owner().to_sql())));
    }

    #[test]
    fn select_policy_rejects_with_check() {
        let result = PolicySpec::new(
            ident("clientes"),
            ident("p"),
            PolicyCommand::Select,
            owner(),
        )
        .and_then(|s| s.with_check(owner()));
        assert!(matches!(result, Err(RlsError::InvalidPolicy { .. })));
    }

    #[test]
    fn insert_policy_rejects_using() {
        let result = PolicySpec::new(ident("clientes"), ident("p"), PolicyCommand::Insert, owner());
        assert!(result.is_err());
    }

    #[test]
    fn table_statements() {
        let t = ident("documents");
        assert_eq!(enable_rls_sql(&t), "ALTER TABLE documents ENABLE ROW LEVEL SECURITY");
        assert_eq!(force_rls_sql(&t), "ALTER TABLE documents FORCE ROW LEVEL SECURITY");
        assert_eq!(disable_rls_sql(&t), "ALTER TABLE documents DISABLE ROW LEVEL SECURITY");
    }
}
