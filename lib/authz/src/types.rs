//! Permission keys, typed permission rules, and shareable resources.

use crate::error::AuthzError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Wildcard token accepted in either position of a permission key.
pub const WILDCARD: &str = "*";

fn invalid(details: impl Into<String>) -> AuthzError {
    AuthzError::InvalidInput {
        details: details.into(),
    }
}

fn validate_part(kind: &str, value: &str) -> Result<(), AuthzError> {
    if value.is_empty() {
        return Err(invalid(format!("{kind} must not be empty")));
    }
    if value.contains(':') || value.chars().any(char::is_whitespace) {
        return Err(invalid(format!(
            "{kind} '{value}' must not contain ':' or whitespace"
        )));
    }
    Ok(())
}

/// A `"<resource>:<action>"` permission key, e.g. `"casos:create"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionKey {
    resource: String,
    action: String,
}

impl PermissionKey {
    /// Creates a key, validating both parts.
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Result<Self, AuthzError> {
        let resource = resource.into();
        let action = action.into();
        validate_part("resource", &resource)?;
        validate_part("action", &action)?;
        Ok(Self { resource, action })
    }

    /// Returns the resource part.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Returns the action part.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

impl FromStr for PermissionKey {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource, action) = s
            .split_once(':')
            .ok_or_else(|| invalid(format!("permission key '{s}' is missing ':'")))?;
        Self::new(resource, action)
    }
}

impl Serialize for PermissionKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PermissionKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A single typed grant derived from a role's permission map.
///
/// Every variant is an allow; there is no deny rule, so evaluation is a
/// plain union and the order of rules never matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PermissionRule {
    /// One action on one resource.
    Exact { resource: String, action: String },
    /// Every action on one resource (`{"casos": ["*"]}`).
    ResourceWildcard { resource: String },
    /// One action on every resource (`{"*": ["read"]}`).
    AnyResource { action: String },
    /// Everything (`{"*": ["*"]}`).
    GlobalWildcard,
}

impl PermissionRule {
    /// Returns true if this rule allows `action` on `resource`.
    #[must_use]
    pub fn allows(&self, resource: &str, action: &str) -> bool {
        match self {
            Self::Exact {
                resource: r,
                action: a,
            } => r == resource && a == action,
            Self::ResourceWildcard { resource: r } => r == resource,
            Self::AnyResource { action: a } => a == action,
            Self::GlobalWildcard => true,
        }
    }

    fn from_pair(resource: &str, action: &str) -> Self {
        match (resource == WILDCARD, action == WILDCARD) {
            (true, true) => Self::GlobalWildcard,
            (true, false) => Self::AnyResource {
                action: action.to_string(),
            },
            (false, true) => Self::ResourceWildcard {
                resource: resource.to_string(),
            },
            (false, false) => Self::Exact {
                resource: resource.to_string(),
                action: action.to_string(),
            },
        }
    }

    fn as_pair(&self) -> (&str, &str) {
        match self {
            Self::Exact { resource, action } => (resource, action),
            Self::ResourceWildcard { resource } => (resource, WILDCARD),
            Self::AnyResource { action } => (WILDCARD, action),
            Self::GlobalWildcard => (WILDCARD, WILDCARD),
        }
    }

    /// Renders the rule as a permission key string, wildcards included.
    #[must_use]
    pub fn as_key_string(&self) -> String {
        let (resource, action) = self.as_pair();
        format!("{resource}:{action}")
    }
}

/// A role's permission map as stored in JSON: resource name to actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(BTreeMap<String, BTreeSet<String>>);

impl PermissionMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `action` under `resource`.
    pub fn allow(&mut self, resource: &str, action: &str) -> Result<(), AuthzError> {
        validate_part("resource", resource)?;
        validate_part("action", action)?;
        self.0
            .entry(resource.to_string())
            .or_default()
            .insert(action.to_string());
        Ok(())
    }

    /// Builder form of [`PermissionMap::allow`].
    pub fn with(mut self, resource: &str, actions: &[&str]) -> Result<Self, AuthzError> {
        for action in actions {
            self.allow(resource, action)?;
        }
        Ok(self)
    }

    /// Parses and validates a JSON value.
    ///
    /// Anything other than an object of string arrays is rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, AuthzError> {
        let object = value
            .as_object()
            .ok_or_else(|| invalid("permission map must be a JSON object"))?;
        let mut map = Self::new();
        for (resource, actions) in object {
            let actions = actions.as_array().ok_or_else(|| {
                invalid(format!("actions for '{resource}' must be an array"))
            })?;
            for action in actions {
                let action = action.as_str().ok_or_else(|| {
                    invalid(format!("actions for '{resource}' must be strings"))
                })?;
                map.allow(resource, action)?;
            }
        }
        Ok(map)
    }

    /// Serializes the map to JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }

    /// Converts the map into typed rules.
    #[must_use]
    pub fn rules(&self) -> Vec<PermissionRule> {
        self.0
            .iter()
            .flat_map(|(resource, actions)| {
                actions
                    .iter()
                    .map(move |action| PermissionRule::from_pair(resource, action))
            })
            .collect()
    }

    /// Builds a map back from typed rules.
    #[must_use]
    pub fn from_rules(rules: &[PermissionRule]) -> Self {
        let mut map = Self::new();
        for rule in rules {
            let (resource, action) = rule.as_pair();
            map.0
                .entry(resource.to_string())
                .or_default()
                .insert(action.to_string());
        }
        map
    }

    /// Returns true if the map has no grants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }
}

/// Resource categories that can be owned and shared per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// An uploaded document.
    Document,
    /// A case file.
    Expediente,
    /// A client record.
    Cliente,
}

impl ResourceType {
    /// All shareable resource types.
    pub const ALL: [Self; 3] = [Self::Document, Self::Expediente, Self::Cliente];

    /// Returns the name stored in `resource_shares.resource_type`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Expediente => "expediente",
            Self::Cliente => "cliente",
        }
    }

    /// Returns the table holding instances of this resource.
    #[must_use]
    pub fn table(&self) -> &'static str {
        match self {
            Self::Document => "documents",
            Self::Expediente => "expedientes",
            Self::Cliente => "clientes",
        }
    }

    /// Returns the permission-map resource name used for category checks.
    #[must_use]
    pub fn permission_resource(&self) -> &'static str {
        match self {
            Self::Document => "documentos",
            Self::Expediente => "expedientes",
            Self::Cliente => "clientes",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" | "documents" | "documento" | "documentos" => Ok(Self::Document),
            "expediente" | "expedientes" => Ok(Self::Expediente),
            "cliente" | "clientes" => Ok(Self::Cliente),
            other => Err(invalid(format!("unknown resource type '{other}'"))),
        }
    }
}

/// A single resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// The resource category.
    pub resource_type: ResourceType,
    /// The instance ID, as text.
    pub resource_id: String,
}

impl ResourceRef {
    /// Creates a resource reference.
    #[must_use]
    pub fn new(resource_type: ResourceType, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.resource_id)
    }
}

/// Access level carried by a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// May read the resource.
    Read,
    /// May read, update, and delete the resource.
    Write,
}

impl AccessLevel {
    /// Returns the stored name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    /// Returns true if this level authorizes `operation`.
    ///
    /// `read` shares never authorize mutation.
    #[must_use]
    pub fn permits(&self, operation: Operation) -> bool {
        match (self, operation) {
            (Self::Write, _) => true,
            (Self::Read, Operation::Read) => true,
            (Self::Read, Operation::Write) => false,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            other => Err(invalid(format!("unknown access level '{other}'"))),
        }
    }
}

/// Kind of operation a handler is about to perform on a resource instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// SELECT-like access.
    Read,
    /// UPDATE or DELETE.
    Write,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn permission_key_parses_and_displays() {
        let key: PermissionKey = "casos:create".parse().expect("parse");
        assert_eq!(key.resource(), "casos");
        assert_eq!(key.action(), "create");
        assert_eq!(key.to_string(), "casos:create");
    }

    #[test]
    fn permission_key_accepts_wildcards() {
        let key: PermissionKey = "*:*".parse().expect("parse");
        assert_eq!(key.resource(), "*");
    }

    #[test]
    fn permission_key_rejects_malformed_input() {
        assert!("casos".parse::<PermissionKey>().is_err());
        assert!(":read".parse::<PermissionKey>().is_err());
        assert!("casos:".parse::<PermissionKey>().is_err());
        assert!("casos:read:extra".parse::<PermissionKey>().is_err());
        assert!("ca sos:read".parse::<PermissionKey>().is_err());
    }

    #[test]
    fn rules_from_map_cover_every_wildcard_shape() {
        let map = PermissionMap::from_json(&json!({
            "documentos": ["read"],
            "casos": ["*"],
            "*": ["export", "*"],
        }))
        .expect("valid map");

        let rules = map.rules();
        assert!(rules.contains(&PermissionRule::Exact {
            resource: "documentos".to_string(),
            action: "read".to_string(),
        }));
        assert!(rules.contains(&PermissionRule::ResourceWildcard {
            resource: "casos".to_string(),
        }));
        assert!(rules.contains(&PermissionRule::AnyResource {
            action: "export".to_string(),
        }));
        assert!(rules.contains(&PermissionRule::GlobalWildcard));
        assert_eq!(PermissionMap::from_rules(&rules), map);
    }

    #[test]
    fn rule_matching() {
        let exact = PermissionRule::Exact {
            resource: "documentos".to_string(),
            action: "read".to_string(),
        };
        assert!(exact.allows("documentos", "read"));
        assert!(!exact.allows("documentos", "delete"));

        let any = PermissionRule::AnyResource {
            action: "read".to_string(),
        };
        assert!(any.allows("clientes", "read"));
        assert!(!any.allows("clientes", "update"));
        assert!(PermissionRule::GlobalWildcard.allows("x", "y"));
    }

    #[test]
    fn permission_map_rejects_bad_shapes() {
        assert!(PermissionMap::from_json(&json!(["read"])).is_err());
        assert!(PermissionMap::from_json(&json!({"casos": "read"})).is_err());
        assert!(PermissionMap::from_json(&json!({"casos": [1]})).is_err());
        assert!(PermissionMap::from_json(&json!({"casos": [""]})).is_err());
    }

    #[test]
    fn empty_map_is_empty() {
        assert!(PermissionMap::new().is_empty());
        assert!(PermissionMap::from_json(&json!({"casos": []})).expect("map").is_empty());
    }

    #[test]
    fn read_share_never_permits_write() {
        assert!(AccessLevel::Read.permits(Operation::Read));
        assert!(!AccessLevel::Read.permits(Operation::Write));
        assert!(AccessLevel::Write.permits(Operation::Write));
    }

    #[test]
    fn resource_type_aliases() {
        assert_eq!("expedientes".parse::<ResourceType>().ok(), Some(ResourceType::Expediente));
        assert_eq!("document".parse::<ResourceType>().ok(), Some(ResourceType::Document));
        assert!("casos_secretos".parse::<ResourceType>().is_err());
        assert_eq!(ResourceType::Cliente.table(), "clientes");
    }
}
