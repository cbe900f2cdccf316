//! TOML-based configuration system for ldapmap.
//!
//! The LDAP bind password is stored as a `_env` field that references an
//! environment variable name. The actual secret is resolved at runtime via
//! [`AppConfig::resolve_env_vars`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::mapper::MapperRegistry;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Daemon / polling settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Directory server connection and search settings.
    pub ldap: LdapConfig,

    /// Mapper selection and attribute mapping.
    #[serde(default)]
    pub mapping: MappingConfig,

    /// Where published maps are written.
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// Daemon / polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Seconds between publishing cycles (default 300).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_interval() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// LDAP
// ---------------------------------------------------------------------------

/// Directory server connection and search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// Server URL (e.g. `ldap://ldap.example.com` or `ldaps://...`).
    pub url: String,

    /// Bind DN. Empty means an anonymous search.
    #[serde(default)]
    pub bind_dn: String,

    /// Environment variable holding the bind password.
    #[serde(default)]
    pub bind_password_env: Option<String>,

    /// Upgrade plain `ldap://` connections with StartTLS.
    #[serde(default)]
    pub starttls: bool,

    /// Connect timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Search base for user entries.
    pub user_base_dn: String,

    /// Search filter for user entries.
    #[serde(default = "default_user_filter")]
    pub user_filter: String,

    /// Search base for group entries.
    pub group_base_dn: String,

    /// Search filter for group entries.
    #[serde(default = "default_group_filter")]
    pub group_filter: String,

    /// Resolved bind password (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub bind_password: Option<String>,
}

fn default_timeout() -> u64 {
    10
}
fn default_user_filter() -> String {
    "(objectClass=posixAccount)".into()
}
fn default_group_filter() -> String {
    "(objectClass=posixGroup)".into()
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Attribute role (`name`, `gid`) -> LDAP attribute name.
pub type AttrMap = BTreeMap<String, String>;

/// How group membership is encoded in the directory.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberScheme {
    /// Groups list member DNs in `member`.
    Member,
    /// Groups list member usernames in `memberUid`.
    #[default]
    MemberUid,
    /// Users list group DNs in `memberOf`.
    MemberOf,
}

impl MemberScheme {
    /// The attribute carrying membership for this scheme.
    pub fn attribute(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::MemberUid => "memberUid",
            Self::MemberOf => "memberOf",
        }
    }

    /// Whether membership is read from user entries rather than groups.
    pub fn is_user_centric(self) -> bool {
        matches!(self, Self::MemberOf)
    }
}

impl fmt::Display for MemberScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member => write!(f, "member"),
            Self::MemberUid => write!(f, "memberuid"),
            Self::MemberOf => write!(f, "memberof"),
        }
    }
}

/// Mapper selection and attribute mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Names of the mappers to run each cycle.
    #[serde(default = "default_mappers")]
    pub mappers: Vec<String>,

    /// Membership encoding used by the directory.
    #[serde(default)]
    pub member_scheme: MemberScheme,

    /// Prefix prepended to usernames in output keys.
    #[serde(default)]
    pub user_prefix: String,

    /// Attributes read from user entries.
    #[serde(default = "default_user_attr_map")]
    pub user_attr_map: AttrMap,

    /// Attributes read from group entries.
    #[serde(default = "default_group_attr_map")]
    pub group_attr_map: AttrMap,
}

fn default_mappers() -> Vec<String> {
    vec!["user-groups".into()]
}
fn default_user_attr_map() -> AttrMap {
    AttrMap::from([
        ("name".to_string(), "uid".to_string()),
        ("gid".to_string(), "gidNumber".to_string()),
    ])
}
fn default_group_attr_map() -> AttrMap {
    AttrMap::from([
        ("name".to_string(), "cn".to_string()),
        ("gid".to_string(), "gidNumber".to_string()),
    ])
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            mappers: default_mappers(),
            member_scheme: MemberScheme::default(),
            user_prefix: String::new(),
            user_attr_map: default_user_attr_map(),
            group_attr_map: default_group_attr_map(),
        }
    }
}

impl MappingConfig {
    /// Attribute configured for `role` on user entries, or `""`.
    pub fn user_attr(&self, role: &str) -> &str {
        self.user_attr_map.get(role).map(String::as_str).unwrap_or("")
    }

    /// Attribute configured for `role` on group entries, or `""`.
    pub fn group_attr(&self, role: &str) -> &str {
        self.group_attr_map.get(role).map(String::as_str).unwrap_or("")
    }

    /// Attributes to request when searching for users.
    pub fn user_search_attrs(&self) -> Vec<String> {
        let mut attrs: Vec<String> = self.user_attr_map.values().cloned().collect();
        if self.member_scheme.is_user_centric() {
            attrs.push(self.member_scheme.attribute().to_string());
        }
        attrs.sort();
        attrs.dedup();
        attrs
    }

    /// Attributes to request when searching for groups.
    pub fn group_search_attrs(&self) -> Vec<String> {
        let mut attrs: Vec<String> = self.group_attr_map.values().cloned().collect();
        if !self.member_scheme.is_user_centric() {
            attrs.push(self.member_scheme.attribute().to_string());
        }
        attrs.sort();
        attrs.dedup();
        attrs
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one `<config-map-name>.json` per mapper.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("/var/lib/ldapmap")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve `*_env` fields from environment variables.
    ///
    /// A missing variable logs a warning but does not fail; the bind is then
    /// attempted with an empty password.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref env_name) = self.ldap.bind_password_env {
            self.ldap.bind_password = resolve_optional_env(env_name, "ldap.bind_password_env");
        }
        Ok(())
    }

    /// Validate that all required fields are present and sane, and that
    /// every configured mapper exists and has the attributes it needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("ldap.url", &self.ldap.url),
            ("ldap.user_base_dn", &self.ldap.user_base_dn),
            ("ldap.group_base_dn", &self.ldap.group_base_dn),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    detail: "must not be empty".into(),
                });
            }
        }
        if self.daemon.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "daemon.interval_secs".into(),
                detail: "interval must be > 0".into(),
            });
        }
        if self.mapping.mappers.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "mapping.mappers".into(),
                detail: "at least one mapper must be configured".into(),
            });
        }

        let registry = MapperRegistry::builtin();
        for name in &self.mapping.mappers {
            registry
                .check(name, &self.mapping)
                .map_err(|e| ConfigError::InvalidValue {
                    field: "mapping.mappers".into(),
                    detail: e.to_string(),
                })?;
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}
