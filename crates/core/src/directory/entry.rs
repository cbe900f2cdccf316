//! Directory entries as handed to the mappers.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::DirectoryError;

/// A single entry returned by a directory search.
///
/// Attribute names are matched case-insensitively, as LDAP attribute
/// descriptions are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Distinguished name.
    pub dn: String,
    /// Attribute name -> values.
    #[serde(default)]
    pub attrs: BTreeMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: BTreeMap::new(),
        }
    }

    /// Builder-style helper: set `attr` to a single value.
    pub fn with_attr(self, attr: &str, value: impl Into<String>) -> Self {
        self.with_values(attr, [value.into()])
    }

    /// Builder-style helper: set `attr` to the given values.
    pub fn with_values<I, S>(mut self, attr: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs
            .insert(attr.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    /// All values of `attr`, or an empty slice when absent.
    pub fn values(&self, attr: &str) -> &[String] {
        self.attrs
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attr))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// First value of `attr`, or `""` when absent.
    pub fn value(&self, attr: &str) -> &str {
        self.values(attr).first().map(String::as_str).unwrap_or("")
    }
}

/// The user and group search results of one directory query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub users: Vec<DirectoryEntry>,
    #[serde(default)]
    pub groups: Vec<DirectoryEntry>,
}

impl DirectorySnapshot {
    /// Load a snapshot previously dumped as JSON.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DirectoryError::Snapshot(format!("{}: {}", path.display(), e)))?;
        let snapshot: DirectorySnapshot = serde_json::from_str(&contents)
            .map_err(|e| DirectoryError::Snapshot(format!("{}: {}", path.display(), e)))?;
        debug!(
            users = snapshot.users.len(),
            groups = snapshot.groups.len(),
            "loaded directory snapshot"
        );
        Ok(snapshot)
    }
}
