//! Pure permission evaluation over a snapshot of a user's grants.
//!
//! A [`GrantSnapshot`] is loaded once per request from a single database
//! snapshot and then answers any number of questions without touching the
//! database again. Nothing is cached across requests.

use crate::types::{PermissionKey, PermissionRule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Pseudo-resource that is always accessible to its caller.
pub const OWN_RESOURCE: &str = "own";

/// Category resources checked by [`GrantSnapshot::can_access_resource`],
/// each mapped to the action that gates entry.
pub const RESOURCE_ACCESS_ACTIONS: &[(&str, &str)] = &[
    ("documents", "read"),
    ("documentos", "read"),
    ("expedientes", "read"),
    ("clientes", "read"),
    ("usuarios", "read"),
    ("roles", "read"),
    ("auditoria", "read"),
    ("calendario", "read"),
];

/// How a `granted = false` direct permission interacts with roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationPolicy {
    /// Revoked rows are invisible; a role may still grant the key.
    #[default]
    Additive,
    /// A revoked row for the exact key denies, even over a role grant.
    ExplicitDeny,
}

/// A direct per-user grant or soft revocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectGrant {
    /// The exact key this row is about.
    pub key: PermissionKey,
    /// `false` marks a soft revocation.
    pub granted: bool,
    /// Optional JSON object narrowing the grant.
    pub scope: Option<serde_json::Value>,
}

impl DirectGrant {
    /// Returns true if the grant's scope admits `requested`.
    ///
    /// An absent scope admits everything. Otherwise every key of the grant's
    /// scope object must be present with an equal value in `requested`.
    #[must_use]
    pub fn scope_admits(&self, requested: &serde_json::Value) -> bool {
        let Some(scope) = &self.scope else {
            return true;
        };
        match (scope.as_object(), requested.as_object()) {
            (Some(scope), Some(requested)) => scope
                .iter()
                .all(|(key, value)| requested.get(key) == Some(value)),
            (Some(scope), None) => scope.is_empty(),
            _ => scope == requested,
        }
    }
}

/// A role assignment with its rules already typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    /// The role's machine name.
    pub name: String,
    /// Typed rules from the role's permission map.
    pub rules: Vec<PermissionRule>,
}

/// Everything needed to decide a user's permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantSnapshot {
    super_admin: bool,
    direct: Vec<DirectGrant>,
    roles: Vec<RoleGrant>,
    policy: RevocationPolicy,
}

impl GrantSnapshot {
    /// Creates a snapshot for a super admin. No grants are consulted.
    #[must_use]
    pub fn super_admin() -> Self {
        Self {
            super_admin: true,
            direct: Vec::new(),
            roles: Vec::new(),
            policy: RevocationPolicy::default(),
        }
    }

    /// Creates a snapshot from loaded grants.
    #[must_use]
    pub fn new(direct: Vec<DirectGrant>, roles: Vec<RoleGrant>, policy: RevocationPolicy) -> Self {
        Self {
            super_admin: false,
            direct,
            roles,
            policy,
        }
    }

    /// Returns true if the snapshot belongs to an effective super admin.
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.super_admin
    }

    /// Returns the role names in the snapshot.
    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(|r| r.name.as_str())
    }

    fn explicitly_denied(&self, resource: &str, action: &str) -> bool {
        self.policy == RevocationPolicy::ExplicitDeny
            && self
                .direct
                .iter()
                .any(|g| !g.granted && g.key.resource() == resource && g.key.action() == action)
    }

    fn role_allows(&self, resource: &str, action: &str) -> bool {
        self.roles
            .iter()
            .flat_map(|r| r.rules.iter())
            .any(|rule| rule.allows(resource, action))
    }

    fn direct_allows<F>(&self, resource: &str, action: &str, admit: F) -> bool
    where
        F: Fn(&DirectGrant) -> bool,
    {
        self.direct.iter().any(|g| {
            g.granted && g.key.resource() == resource && g.key.action() == action && admit(g)
        })
    }

    /// Decides whether `action` on `resource` is allowed.
    ///
    /// Super admin wins outright. Otherwise a granted direct permission for
    /// the exact key allows, then any role rule allows. No match denies.
    #[must_use]
    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        if self.super_admin {
            return true;
        }
        if self.explicitly_denied(resource, action) {
            return false;
        }
        self.direct_allows(resource, action, |_| true) || self.role_allows(resource, action)
    }

    /// Like [`GrantSnapshot::has_permission`], but direct grants only count
    /// when their scope admits `scope`. Role grants are unscoped.
    #[must_use]
    pub fn has_permission_in_scope(
        &self,
        resource: &str,
        action: &str,
        scope: &serde_json::Value,
    ) -> bool {
        if self.super_admin {
            return true;
        }
        if self.explicitly_denied(resource, action) {
            return false;
        }
        self.direct_allows(resource, action, |g| g.scope_admits(scope))
            || self.role_allows(resource, action)
    }

    /// Decides whether the user holds the role named `role_name`.
    #[must_use]
    pub fn has_role(&self, role_name: &str) -> bool {
        self.super_admin || self.roles.iter().any(|r| r.name == role_name)
    }

    /// Category-level entry check for a resource.
    ///
    /// Ownership and sharing are not considered here; those are enforced by
    /// the share registry and by row-level security.
    #[must_use]
    pub fn can_access_resource(&self, resource: &str) -> bool {
        if resource == OWN_RESOURCE || self.super_admin {
            return true;
        }
        RESOURCE_ACCESS_ACTIONS
            .iter()
            .find(|(name, _)| *name == resource)
            .is_some_and(|(name, action)| self.has_permission(name, action))
    }

    /// Lists the keys this snapshot grants and the keys soft-revoked.
    #[must_use]
    pub fn effective_permissions(&self) -> EffectivePermissions {
        if self.super_admin {
            return EffectivePermissions {
                super_admin: true,
                granted: BTreeSet::from(["*:*".to_string()]),
                revoked: BTreeSet::new(),
            };
        }

        let revoked: BTreeSet<String> = self
            .direct
            .iter()
            .filter(|g| !g.granted)
            .map(|g| g.key.to_string())
            .collect();

        let mut granted: BTreeSet<String> = self
            .direct
            .iter()
            .filter(|g| g.granted)
            .map(|g| g.key.to_string())
            .collect();
        granted.extend(
            self.roles
                .iter()
                .flat_map(|r| r.rules.iter())
                .map(PermissionRule::as_key_string),
        );
        if self.policy == RevocationPolicy::ExplicitDeny {
            granted.retain(|key| !revoked.contains(key));
        }

        EffectivePermissions {
            super_admin: false,
            granted,
            revoked,
        }
    }
}

/// Summary of a user's permissions for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermissions {
    /// True when every check passes unconditionally.
    pub super_admin: bool,
    /// Granted keys, wildcards included.
    pub granted: BTreeSet<String>,
    /// Soft-revoked direct keys.
    pub revoked: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PermissionMap;
    use serde_json::json;

    fn key(s: &str) -> PermissionKey {
        s.parse().expect("valid key")
    }

    fn role(name: &str, permissions: serde_json::Value) -> RoleGrant {
        RoleGrant {
            name: name.to_string(),
            rules: PermissionMap::from_json(&permissions).expect("map").rules(),
        }
    }

    fn direct(k: &str, granted: bool) -> DirectGrant {
        DirectGrant {
            key: key(k),
            granted,
            scope: None,
        }
    }

    #[test]
    fn super_admin_allows_everything() {
        let snapshot = GrantSnapshot::super_admin();
        assert!(snapshot.has_permission("anything", "at_all"));
        assert!(snapshot.has_role("no_such_role"));
        assert!(snapshot.can_access_resource("unknown_category"));
    }

    #[test]
    fn empty_snapshot_denies() {
        let snapshot = GrantSnapshot::new(Vec::new(), Vec::new(), RevocationPolicy::Additive);
        assert!(!snapshot.has_permission("documentos", "read"));
        assert!(!snapshot.has_role("abogado"));
    }

    #[test]
    fn abogado_reads_but_cannot_delete_documentos() {
        let snapshot = GrantSnapshot::new(
            Vec::new(),
            vec![role("abogado", json!({"documentos": ["read"]}))],
            RevocationPolicy::Additive,
        );
        assert!(snapshot.has_permission("documentos", "read"));
        assert!(!snapshot.has_permission("documentos", "delete"));
        assert!(snapshot.has_role("abogado"));
        assert!(!snapshot.has_role("admin"));
    }

    #[test]
    fn resource_and_global_wildcards() {
        let snapshot = GrantSnapshot::new(
            Vec::new(),
            vec![
                role("casos_admin", json!({"casos": ["*"]})),
                role("lector", json!({"*": ["read"]})),
            ],
            RevocationPolicy::Additive,
        );
        assert!(snapshot.has_permission("casos", "delete"));
        assert!(snapshot.has_permission("clientes", "read"));
        assert!(!snapshot.has_permission("clientes", "update"));

        let root = GrantSnapshot::new(
            Vec::new(),
            vec![role("root", json!({"*": ["*"]}))],
            RevocationPolicy::Additive,
        );
        assert!(root.has_permission("usuarios", "delete"));
    }

    #[test]
    fn direct_grant_allows_without_role() {
        let snapshot = GrantSnapshot::new(
            vec![direct("casos:create", true)],
            Vec::new(),
            RevocationPolicy::Additive,
        );
        assert!(snapshot.has_permission("casos", "create"));
        assert!(!snapshot.has_permission("casos", "delete"));
    }

    #[test]
    fn revoked_direct_grant_stops_contributing() {
        let snapshot = GrantSnapshot::new(
            vec![direct("casos:create", false)],
            vec![role("abogado", json!({"documentos": ["read"]}))],
            RevocationPolicy::Additive,
        );
        assert!(!snapshot.has_permission("casos", "create"));
        assert!(snapshot.has_permission("documentos", "read"));
    }

    #[test]
    fn additive_policy_lets_role_grant_revoked_key() {
        let snapshot = GrantSnapshot::new(
            vec![direct("documentos:read", false)],
            vec![role("abogado", json!({"documentos": ["read"]}))],
            RevocationPolicy::Additive,
        );
        assert!(snapshot.has_permission("documentos", "read"));
    }

    #[test]
    fn explicit_deny_policy_overrides_role_grant() {
        let snapshot = GrantSnapshot::new(
            vec![direct("documentos:read", false)],
            vec![role("abogado", json!({"documentos": ["read", "update"]}))],
            RevocationPolicy::ExplicitDeny,
        );
        assert!(!snapshot.has_permission("documentos", "read"));
        assert!(snapshot.has_permission("documentos", "update"));

        let perms = snapshot.effective_permissions();
        assert!(!perms.granted.contains("documentos:read"));
        assert!(perms.revoked.contains("documentos:read"));
    }

    #[test]
    fn scoped_grant_requires_matching_scope() {
        let snapshot = GrantSnapshot::new(
            vec![DirectGrant {
                key: key("expedientes:update"),
                granted: true,
                scope: Some(json!({"department": "laboral"})),
            }],
            Vec::new(),
            RevocationPolicy::Additive,
        );
        assert!(snapshot.has_permission_in_scope(
            "expedientes",
            "update",
            &json!({"department": "laboral", "office": "madrid"})
        ));
        assert!(!snapshot.has_permission_in_scope(
            "expedientes",
            "update",
            &json!({"department": "penal"})
        ));
        // Scope is ignored by the plain check.
        assert!(snapshot.has_permission("expedientes", "update"));
    }

    #[test]
    fn can_access_resource_uses_category_read() {
        let snapshot = GrantSnapshot::new(
            Vec::new(),
            vec![role("asistente", json!({"clientes": ["read"]}))],
            RevocationPolicy::Additive,
        );
        assert!(snapshot.can_access_resource(OWN_RESOURCE));
        assert!(snapshot.can_access_resource("clientes"));
        assert!(!snapshot.can_access_resource("documentos"));
        assert!(!snapshot.can_access_resource("not_a_category"));
    }

    #[test]
    fn documents_category_requires_documents_read() {
        let reader = GrantSnapshot::new(
            Vec::new(),
            vec![role("lector", json!({"documents": ["read"]}))],
            RevocationPolicy::Additive,
        );
        assert!(reader.has_permission("documents", "read"));
        assert!(reader.can_access_resource("documents"));

        let writer_only = GrantSnapshot::new(
            Vec::new(),
            vec![role("redactor", json!({"documents": ["create"]}))],
            RevocationPolicy::Additive,
        );
        assert!(!writer_only.can_access_resource("documents"));
    }

    #[test]
    fn effective_permissions_union() {
        let snapshot = GrantSnapshot::new(
            vec![direct("casos:create", true), direct("casos:delete", false)],
            vec![role("lector", json!({"*": ["read"]}))],
            RevocationPolicy::Additive,
        );
        let perms = snapshot.effective_permissions();
        assert!(!perms.super_admin);
        assert!(perms.granted.contains("casos:create"));
        assert!(perms.granted.contains("*:read"));
        assert!(perms.revoked.contains("casos:delete"));
    }
}
