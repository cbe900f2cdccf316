//! Per-run lookup tables: DN -> display name and gid -> group name.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::directory::{parse_dn, DirectoryEntry};

/// Resolve `dn` through `index`, falling back to the DN's leading RDN value.
pub fn resolve_name(dn: &str, index: &HashMap<String, String>) -> String {
    match index.get(dn) {
        Some(name) => name.clone(),
        None => parse_dn(dn),
    }
}

/// DN -> display name for one set of entries, plus the set of known names.
#[derive(Debug, Default)]
pub struct NameIndex {
    by_dn: HashMap<String, String>,
    names: HashSet<String>,
}

impl NameIndex {
    /// Index `entries` by DN, reading display names from `name_attr`.
    pub fn build(entries: &[DirectoryEntry], name_attr: &str) -> Self {
        let mut index = Self::default();
        for entry in entries {
            let name = entry.value(name_attr);
            index.by_dn.insert(entry.dn.clone(), name.to_string());
            if !name.is_empty() {
                index.names.insert(name.to_string());
            }
        }
        index
    }

    /// Display name for `dn`; never fails.
    pub fn resolve(&self, dn: &str) -> String {
        resolve_name(dn, &self.by_dn)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Resolve `dn` and keep the result only if it names a known entry.
    pub fn resolve_known(&self, dn: &str) -> Option<String> {
        let name = self.resolve(dn);
        if self.contains_name(&name) {
            Some(name)
        } else {
            debug!(dn, "dropping reference to unknown entry");
            None
        }
    }
}

/// gid -> group name.
///
/// When several groups share a gid the one seen last wins.
#[derive(Debug, Default)]
pub struct GidIndex {
    by_gid: HashMap<String, String>,
}

impl GidIndex {
    pub fn build(groups: &[DirectoryEntry], name_attr: &str, gid_attr: &str) -> Self {
        let mut by_gid = HashMap::new();
        for group in groups {
            let gid = group.value(gid_attr);
            if gid.is_empty() {
                continue;
            }
            let name = group.value(name_attr).to_string();
            if let Some(previous) = by_gid.insert(gid.to_string(), name) {
                debug!(gid, previous = %previous, "gid shared by several groups, keeping the last");
            }
        }
        Self { by_gid }
    }

    /// Group owning `gid`. An empty gid never matches.
    pub fn get(&self, gid: &str) -> Option<&str> {
        if gid.is_empty() {
            return None;
        }
        self.by_gid
            .get(gid)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }
}
