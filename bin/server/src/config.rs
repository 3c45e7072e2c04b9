//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (e.g. `SESSION__DURATION_MINUTES`, `RLS__FORCE`).

use lexcase_audit::AuditSettings;
use lexcase_authz::RevocationPolicy;
use serde::Deserialize;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Connection pool configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Row-level security configuration.
    #[serde(default)]
    pub rls: RlsConfig,

    /// Permission evaluation configuration.
    #[serde(default)]
    pub authz: AuthzConfig,

    /// Audit read-path limits.
    #[serde(default)]
    pub audit: AuditSettings,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

/// Connection pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
        }
    }
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session duration in minutes.
    #[serde(default = "default_session_duration_minutes")]
    pub duration_minutes: i64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Name of the cookie carrying the session token.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_session_duration_minutes() -> i64 {
    480
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_cookie_name() -> String {
    "session".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_session_duration_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            cookie_name: default_cookie_name(),
        }
    }
}

/// Row-level security configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RlsConfig {
    /// Install the policy table when the server starts.
    #[serde(default = "default_sync_on_startup")]
    pub sync_on_startup: bool,

    /// Also bind the table owner with `FORCE ROW LEVEL SECURITY`.
    #[serde(default)]
    pub force: bool,

    /// Database roles the policies apply to; empty means `PUBLIC`.
    #[serde(default)]
    pub policy_roles: Vec<String>,
}

fn default_sync_on_startup() -> bool {
    true
}

impl Default for RlsConfig {
    fn default() -> Self {
        Self {
            sync_on_startup: default_sync_on_startup(),
            force: false,
            policy_roles: Vec::new(),
        }
    }
}

/// Permission evaluation configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthzConfig {
    /// How soft-revoked direct permissions interact with roles.
    #[serde(default)]
    pub revocation_policy: RevocationPolicy,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// `RLS__POLICY_ROLES` is a comma-separated list.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("rls.policy_roles")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_has_correct_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.duration_minutes, 480);
        assert_eq!(config.cleanup_interval_seconds, 300);
        assert_eq!(config.cookie_name, "session");
    }

    #[test]
    fn rls_config_syncs_by_default() {
        let config = RlsConfig::default();
        assert!(config.sync_on_startup);
        assert!(!config.force);
        assert!(config.policy_roles.is_empty());
    }

    #[test]
    fn only_database_url_is_required() {
        let config: ServerConfig =
            serde_json::from_value(serde_json::json!({ "database_url": "postgres://localhost/lexcase" }))
                .expect("deserialize");
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.authz.revocation_policy, RevocationPolicy::Additive);
        assert_eq!(config.audit.max_page_size, 200);
    }

    #[test]
    fn revocation_policy_parses_snake_case() {
        let config: AuthzConfig =
            serde_json::from_value(serde_json::json!({ "revocation_policy": "explicit_deny" }))
                .expect("deserialize");
        assert_eq!(config.revocation_policy, RevocationPolicy::ExplicitDeny);
    }
}
