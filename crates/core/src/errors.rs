//! Error types for the ldapmap core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Mapper(#[from] MapperError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Directory errors
// ---------------------------------------------------------------------------

/// Errors from querying the LDAP directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Could not open a connection to the directory server.
    #[error("LDAP connection to '{url}' failed: {detail}")]
    Connect {
        url: String,
        detail: String,
    },

    /// The bind was rejected.
    #[error("LDAP bind as '{bind_dn}' failed: {detail}")]
    Bind {
        bind_dn: String,
        detail: String,
    },

    /// A search returned an error result.
    #[error("LDAP search under '{base_dn}' failed: {detail}")]
    Search {
        base_dn: String,
        detail: String,
    },

    /// A snapshot file could not be read or parsed.
    #[error("directory snapshot error: {0}")]
    Snapshot(String),
}

// ---------------------------------------------------------------------------
// Mapper errors
// ---------------------------------------------------------------------------

/// Errors from building or running a mapper.
#[derive(Debug, Error)]
pub enum MapperError {
    /// No mapper is registered under the requested name.
    #[error("unknown mapper '{0}'")]
    UnknownMapper(String),

    /// The configured attribute map lacks a role the mapper needs.
    #[error("mapper '{mapper}' requires the '{role}' attribute for {kind} entries")]
    MissingAttribute {
        mapper: String,
        kind: &'static str,
        role: String,
    },
}

// ---------------------------------------------------------------------------
// Publish errors
// ---------------------------------------------------------------------------

/// Errors from writing mapper output.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Output could not be written.
    #[error("failed to publish '{name}': {source}")]
    Write {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Output could not be encoded.
    #[error("failed to encode '{name}': {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Errors from a fetch-map-publish cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another cycle is already running.
    #[error("sync cycle already in progress")]
    AlreadyRunning,

    /// Every configured mapper failed.
    #[error("all {0} mappers failed")]
    AllMappersFailed(usize),
}
