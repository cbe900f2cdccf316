//! ldapmap core library.
//!
//! This crate fetches user and group entries from an LDAP directory, runs
//! mappers over them (most notably per-user group membership resolution),
//! and publishes each mapper's output as a flat key/value map.

pub mod config;
pub mod directory;
pub mod errors;
pub mod mapper;
pub mod publish;
pub mod sync_engine;

// Re-exports for convenience.
pub use config::AppConfig;
pub use directory::{DirectoryEntry, DirectorySnapshot, LdapDirectory};
pub use mapper::{Mapper, MapperRegistry};
pub use publish::{JsonDirPublisher, Publisher};
pub use sync_engine::SyncEngine;
