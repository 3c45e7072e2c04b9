//! The declarative policy table for lexcase's business tables.

use crate::error::RlsError;
use crate::ident::Ident;
use crate::policy::{PolicyCommand, PolicySpec};
use crate::predicate::Predicate;
use lexcase_authz::{Operation, ResourceType, RevocationPolicy};

/// Ownership column shared by every protected table.
pub const OWNER_COLUMN: &str = "owner_id";

/// Primary key column shared by every protected table.
pub const ID_COLUMN: &str = "id";

/// Knobs for [`default_policies`].
#[derive(Debug, Clone, Default)]
pub struct CatalogOptions {
    /// Database roles the policies apply to; empty means `PUBLIC`.
    pub roles: Vec<Ident>,
    /// How soft-revoked direct permissions affect category reads.
    pub revocation_policy: RevocationPolicy,
}

/// Name of the read policy for `resource_type`.
#[must_use]
pub fn select_policy_name(resource_type: ResourceType) -> String {
    format!("{}_select_policy", resource_type.table())
}

/// Name of the mutation policy for `resource_type`.
#[must_use]
pub fn modify_policy_name(resource_type: ResourceType) -> String {
    format!("{}_modify_policy", resource_type.table())
}

/// Builds the two policies protecting `resource_type`'s table.
///
/// Reads: owner, read or write share, category read permission, or super
/// admin. Mutations: owner, write share, or super admin. Category
/// permission alone never authorizes a mutation.
pub fn policies_for(
    resource_type: ResourceType,
    options: &CatalogOptions,
) -> Result<Vec<PolicySpec>, RlsError> {
    let table = Ident::new(resource_type.table())?;
    let owner = Predicate::OwnedByCurrentUser {
        table: table.clone(),
        column: Ident::new(OWNER_COLUMN)?,
    };
    let shared = |operation| -> Result<Predicate, RlsError> {
        Ok(Predicate::SharedWithCurrentUser {
            table: table.clone(),
            id_column: Ident::new(ID_COLUMN)?,
            resource_type,
            operation,
        })
    };

    let read = Predicate::Or(vec![
        owner.clone(),
        shared(Operation::Read)?,
        Predicate::CategoryPermission {
            resource: resource_type.permission_resource().to_string(),
            action: "read".to_string(),
            explicit_deny: options.revocation_policy == RevocationPolicy::ExplicitDeny,
        },
        Predicate::CurrentUserIsSuperAdmin,
    ]);
    let modify = Predicate::Or(vec![
        owner,
        shared(Operation::Write)?,
        Predicate::CurrentUserIsSuperAdmin,
    ]);

    let select = PolicySpec::new(
        table.clone(),
        Ident::new(select_policy_name(resource_type))?,
        PolicyCommand::Select,
        read,
    )?
    .to_roles(options.roles.clone());

    let mutate = PolicySpec::new(
        table,
        Ident::new(modify_policy_name(resource_type))?,
        PolicyCommand::All,
        modify.clone(),
    )?
    .with_check(modify)?
    .to_roles(options.roles.clone());

    Ok(vec![select, mutate])
}

/// Builds the full policy table for every shareable resource type.
pub fn default_policies(options: &CatalogOptions) -> Result<Vec<PolicySpec>, RlsError> {
    let mut policies = Vec::new();
    for resource_type in ResourceType::ALL {
        policies.extend(policies_for(resource_type, options)?);
    }
    Ok(policies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(policies: &[PolicySpec]) -> Vec<String> {
        policies.iter().map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn two_policies_per_table() {
        let policies = default_policies(&CatalogOptions::default()).expect("catalog");
        assert_eq!(
            names(&policies),
            vec![
                "documents_select_policy",
                "documents_modify_policy",
                "expedientes_select_policy",
                "expedientes_modify_policy",
                "clientes_select_policy",
                "clientes_modify_policy",
            ]
        );
    }

    #[test]
    fn read_policy_includes_category_permission() {
        let policies = policies_for(ResourceType::Expediente, &CatalogOptions::default())
            .expect("catalog");
        let select = &policies[0];
        assert_eq!(select.command(), PolicyCommand::Select);
        let sql = select.create_sql();
        assert!(sql.contains("'expedientes:read'"));
        assert!(sql.contains("rs.access IN ('read', 'write')"));
        assert!(!sql.contains("WITH CHECK"));
    }

    #[test]
    fn modify_policy_never_uses_category_permission() {
        let policies = policies_for(ResourceType::Cliente, &CatalogOptions::default())
            .expect("catalog");
        let modify = &policies[1];
        assert_eq!(modify.command(), PolicyCommand::All);
        let sql = modify.create_sql();
        assert!(!sql.contains("r.permissions"));
        assert!(!sql.contains("user_permissions"));
        assert!(sql.contains("rs.access IN ('write')"));
        assert_eq!(modify.check(), Some(modify.using()));
    }

    #[test]
    fn explicit_deny_reaches_read_policy() {
        let options = CatalogOptions {
            revocation_policy: RevocationPolicy::ExplicitDeny,
            ..CatalogOptions::default()
        };
        let policies = policies_for(ResourceType::Document, &options).expect("catalog");
        assert!(policies[0].create_sql().contains("NOT dp.granted"));
    }

    #[test]
    fn roles_are_applied_to_every_policy() {
        let options = CatalogOptions {
            roles: vec![Ident::new("lexcase_app").expect("ident")],
            ..CatalogOptions::default()
        };
        let policies = default_policies(&options).expect("catalog");
        assert!(policies.iter().all(|p| p.create_sql().contains(" TO lexcase_app ")));
    }
}
