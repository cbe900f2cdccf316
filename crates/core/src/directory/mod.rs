//! Directory access: entries, DN parsing, and the LDAP fetcher.

pub mod client;
pub mod dn;
pub mod entry;

pub use client::LdapDirectory;
pub use dn::parse_dn;
pub use entry::{DirectoryEntry, DirectorySnapshot};
