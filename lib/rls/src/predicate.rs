//! Predicate AST for policy `USING` / `WITH CHECK` clauses.

use crate::ident::{Ident, quote_literal};
use lexcase_authz::{Operation, ResourceType, WILDCARD, levels_for};

/// Postgres setting that carries the acting user's ID.
pub const CURRENT_USER_SETTING: &str = "app.current_user_id";

/// SQL expression reading the acting user's ID.
///
/// `missing_ok = true` plus `NULLIF` turn an unset or reset setting into
/// `NULL`, which makes every comparison false: no setting means no rows.
#[must_use]
pub fn current_user_expr() -> String {
    format!("NULLIF(current_setting('{CURRENT_USER_SETTING}', true), '')::uuid")
}

/// A boolean condition over the row being checked and the acting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `table.column` equals the acting user.
    OwnedByCurrentUser {
        /// Table being protected.
        table: Ident,
        /// Ownership column.
        column: Ident,
    },
    /// The acting user is an effective super admin.
    CurrentUserIsSuperAdmin,
    /// A share on this row grants the acting user `operation`.
    SharedWithCurrentUser {
        /// Table being protected.
        table: Ident,
        /// Primary key column.
        id_column: Ident,
        /// Share resource type recorded in `resource_shares`.
        resource_type: ResourceType,
        /// Operation the share must permit.
        operation: Operation,
    },
    /// A role or a direct grant gives the acting user `resource:action`.
    CategoryPermission {
        /// Permission-map resource name.
        resource: String,
        /// Required action.
        action: String,
        /// Whether a soft-revoked direct row for the exact key denies.
        explicit_deny: bool,
    },
    /// Any child holds.
    Or(Vec<Predicate>),
    /// Every child holds.
    And(Vec<Predicate>),
}

impl Predicate {
    /// Compiles the predicate to SQL.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let current = current_user_expr();
        match self {
            Self::OwnedByCurrentUser { table, column } => {
                format!("{table}.{column} = {current}")
            }
            Self::CurrentUserIsSuperAdmin => format!(
                "EXISTS (SELECT 1 FROM users su WHERE su.id = {current} AND (su.is_super_admin \
                 OR (su.is_temporary_super_admin AND su.super_admin_expires_at > now())))"
            ),
            Self::SharedWithCurrentUser {
                table,
                id_column,
                resource_type,
                operation,
            } => {
                let levels = levels_for(*operation)
                    .iter()
                    .map(|level| quote_literal(level))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "EXISTS (SELECT 1 FROM resource_shares rs WHERE rs.resource_type = {} \
                     AND rs.resource_id = {table}.{id_column}::text AND rs.target_user_id = {current} \
                     AND rs.access IN ({levels}))",
                    quote_literal(resource_type.as_str())
                )
            }
            Self::CategoryPermission {
                resource,
                action,
                explicit_deny,
            } => {
                let res = quote_literal(resource);
                let act = quote_literal(action);
                let any = quote_literal(WILDCARD);
                let key = quote_literal(&format!("{resource}:{action}"));
                let role = format!(
                    "EXISTS (SELECT 1 FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
                     WHERE ur.user_id = {current} AND ((r.permissions -> {res}) ? {act} \
                     OR (r.permissions -> {res}) ? {any} OR (r.permissions -> {any}) ? {act} \
                     OR (r.permissions -> {any}) ? {any}))"
                );
                let direct = format!(
                    "EXISTS (SELECT 1 FROM user_permissions up WHERE up.user_id = {current} \
                     AND up.granted AND up.permission_key = {key})"
                );
                if *explicit_deny {
                    format!(
                        "(({role} OR {direct}) AND NOT EXISTS (SELECT 1 FROM user_permissions dp \
                         WHERE dp.user_id = {current} AND NOT dp.granted AND dp.permission_key = {key}))"
                    )
                } else {
                    format!("({role} OR {direct})")
                }
            }
            Self::Or(children) => join(children, "OR", "false"),
            Self::And(children) => join(children, "AND", "true"),
        }
    }

    /// Fragments that survive Postgres deparsing the compiled predicate.
    ///
    /// `pg_policies` reports expressions re-printed by the server (casts
    /// added, `IN` rewritten, table qualifiers dropped), so an installed
    /// expression is compared by these fragments rather than by text.
    #[must_use]
    pub fn markers(&self) -> Vec<String> {
        let mut markers = Vec::new();
        self.collect_markers(&mut markers);
        markers.sort();
        markers.dedup();
        markers
    }

    fn collect_markers(&self, out: &mut Vec<String>) {
        match self {
            Self::OwnedByCurrentUser { column, .. } => {
                out.push(column.to_string());
                out.push(CURRENT_USER_SETTING.to_string());
            }
            Self::CurrentUserIsSuperAdmin => {
                out.push("is_super_admin".to_string());
                out.push("super_admin_expires_at".to_string());
            }
            Self::SharedWithCurrentUser {
                resource_type,
                operation,
                ..
            } => {
                out.push("resource_shares".to_string());
                out.push(quote_literal(resource_type.as_str()));
                out.extend(levels_for(*operation).iter().map(|level| quote_literal(level)));
            }
            Self::CategoryPermission {
                resource,
                action,
                explicit_deny,
            } => {
                out.push("user_roles".to_string());
                out.push(quote_literal(&format!("{resource}:{action}")));
                if *explicit_deny {
                    out.push("dp.granted".to_string());
                }
            }
            Self::Or(children) | Self::And(children) if !children.is_empty() => {
                for child in children {
                    child.collect_markers(out);
                }
            }
            Self::Or(_) => out.push("false".to_string()),
            Self::And(_) => out.push("true".to_string()),
        }
    }
}

fn join(children: &[Predicate], op: &str, empty: &str) -> String {
    match children {
        [] => empty.to_string(),
        [only] => only.to_sql(),
        many => format!(
            "({})",
            many.iter()
                .map(Predicate::to_sql)
                .collect::<Vec<_>>()
                .join(&format!(" {op} "))
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> Ident {
        Ident::new(s).expect("valid ident")
    }

    #[test]
    fn owner_predicate_reads_session_setting() {
        let p = Predicate::OwnedByCurrentUser {
            table: ident("expedientes"),
            column: ident("owner_id"),
        };
        assert_eq!(
            p.to_sql(),
            "expedientes.owner_id = NULLIF(current_setting('app.current_user_id', true), '')::uuid"
        );
    }

    #[test]
    fn share_predicate_qualifies_row_id() {
        let p = Predicate::SharedWithCurrentUser {
            table: ident("documents"),
            id_column: ident("id"),
            resource_type: ResourceType::Document,
            operation: Operation::Write,
        };
        let sql = p.to_sql();
        assert!(sql.contains("rs.resource_id = documents.id::text"));
        assert!(sql.contains("rs.resource_type = 'document'"));
        assert!(sql.contains("rs.access IN ('write')"));
    }

    #[test]
    fn category_permission_checks_all_wildcard_shapes() {
        let p = Predicate::CategoryPermission {
            resource: "expedientes".to_string(),
            action: "read".to_string(),
            explicit_deny: false,
        };
        let sql = p.to_sql();
        assert!(sql.contains("(r.permissions -> 'expedientes') ? 'read'"));
        assert!(sql.contains("(r.permissions -> 'expedientes') ? '*'"));
        assert!(sql.contains("(r.permissions -> '*') ? 'read'"));
        assert!(sql.contains("(r.permissions -> '*') ? '*'"));
        assert!(sql.contains("up.permission_key = 'expedientes:read'"));
        assert!(!sql.contains("NOT dp.granted"));
    }

    #[test]
    fn explicit_deny_adds_revocation_guard() {
        let p = Predicate::CategoryPermission {
            resource: "clientes".to_string(),
            action: "read".to_string(),
            explicit_deny: true,
        };
        assert!(p.to_sql().contains("AND NOT EXISTS"));
    }

    #[test]
    fn literals_are_escaped() {
        let p = Predicate::CategoryPermission {
            resource: "x' OR true --".to_string(),
            action: "read".to_string(),
            explicit_deny: false,
        };
        assert!(p.to_sql().contains("'x'' OR true --'"));
    }

    #[test]
    fn markers_cover_every_branch() {
        let p = Predicate::Or(vec![
            Predicate::OwnedByCurrentUser {
                table: ident("documents"),
                column: ident("owner_id"),
            },
            Predicate::SharedWithCurrentUser {
                table: ident("documents"),
                id_column: ident("id"),
                resource_type: ResourceType::Document,
                operation: Operation::Write,
            },
            Predicate::CurrentUserIsSuperAdmin,
        ]);
        let markers = p.markers();
        for expected in [
            "owner_id",
            "app.current_user_id",
            "resource_shares",
            "'document'",
            "'write'",
            "is_super_admin",
        ] {
            assert!(markers.iter().any(|m| m == expected), "{expected} in {markers:?}");
        }
        assert!(!markers.iter().any(|m| m == "'read'"));
        assert!(!markers.iter().any(|m| m == "user_roles"));
    }

    #[test]
    fn boolean_combinators() {
        assert_eq!(Predicate::Or(Vec::new()).to_sql(), "false");
        assert_eq!(Predicate::And(Vec::new()).to_sql(), "true");

        let single = Predicate::Or(vec![Predicate::CurrentUserIsSuperAdmin]);
        assert_eq!(single.to_sql(), Predicate::CurrentUserIsSuperAdmin.to_sql());

        let both = Predicate::Or(vec![
            Predicate::OwnedByCurrentUser {
                table: ident("clientes"),
                column: ident("owner_id"),
            },
            Predicate::CurrentUserIsSuperAdmin,
        ]);
        let sql = both.to_sql();
        assert!(sql.starts_with("(clientes.owner_id = "));
        assert!(sql.contains(" OR EXISTS (SELECT 1 FROM users su"));
        assert!(sql.ends_with(')'));
    }
}
