//! Per-user group membership.
//!
//! For every user entry the mapper publishes `prefix + username` mapped to a
//! JSON array of group names. Membership is read according to the configured
//! [`MemberScheme`]; the user's primary group (the group whose gid equals the
//! user's gid) is always first and never duplicated. Other groups keep the
//! order in which they were discovered.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::resolver::{GidIndex, NameIndex};
use super::{Mapper, MapperData};
use crate::config::{MappingConfig, MemberScheme};
use crate::directory::DirectoryEntry;
use crate::errors::MapperError;

pub const NAME: &str = "user-groups";
pub const CONFIG_MAP_NAME: &str = "user-groups-map";

/// Member name -> group names in discovery order, without duplicates.
#[derive(Debug, Default)]
pub struct MembershipTable {
    by_member: HashMap<String, Vec<String>>,
}

impl MembershipTable {
    /// Record that `member` belongs to `group`.
    pub fn add(&mut self, member: &str, group: &str) {
        let groups = self.by_member.entry(member.to_string()).or_default();
        push_unique(groups, group);
    }

    /// Groups recorded for `member`; empty when unknown.
    pub fn groups_of(&self, member: &str) -> &[String] {
        self.by_member
            .get(member)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_member.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_member.is_empty()
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|existing| existing == name) {
        list.push(name.to_string());
    }
}

/// Place `primary` at the front of `list`, moving it if already present.
fn put_first(list: &mut Vec<String>, primary: &str) {
    match list.iter().position(|g| g == primary) {
        Some(0) => {}
        Some(pos) => {
            let name = list.remove(pos);
            list.insert(0, name);
        }
        None => list.insert(0, primary.to_string()),
    }
}

/// The `user-groups` mapper.
#[derive(Debug, Clone)]
pub struct UserGroupsMapper {
    scheme: MemberScheme,
    prefix: String,
    user_name_attr: String,
    user_gid_attr: String,
    group_name_attr: String,
    group_gid_attr: String,
}

impl UserGroupsMapper {
    pub fn new(config: &MappingConfig) -> Self {
        Self {
            scheme: config.member_scheme,
            prefix: config.user_prefix.clone(),
            user_name_attr: config.user_attr("name").to_string(),
            user_gid_attr: config.user_attr("gid").to_string(),
            group_name_attr: config.group_attr("name").to_string(),
            group_gid_attr: config.group_attr("gid").to_string(),
        }
    }

    /// Build the member-keyed table from group entries (`member` and
    /// `memberuid` schemes).
    fn extract_from_groups(&self, groups: &[DirectoryEntry], users: &NameIndex) -> MembershipTable {
        let mut table = MembershipTable::default();
        let attr = self.scheme.attribute();

        for group in groups {
            let group_name = group.value(&self.group_name_attr);
            if group_name.is_empty() {
                debug!(dn = %group.dn, "skipping group without a name");
                continue;
            }
            for value in group.values(attr) {
                let member = match self.scheme {
                    MemberScheme::Member => match users.resolve_known(value) {
                        Some(name) => name,
                        None => continue,
                    },
                    _ => value.clone(),
                };
                if !member.is_empty() {
                    table.add(&member, group_name);
                }
            }
        }
        table
    }

    /// Groups listed on a user entry (`memberof` scheme).
    fn extract_from_user(&self, user: &DirectoryEntry, groups: &NameIndex) -> Vec<String> {
        let mut result = Vec::new();
        for dn in user.values(self.scheme.attribute()) {
            if let Some(name) = groups.resolve_known(dn) {
                push_unique(&mut result, &name);
            }
        }
        result
    }
}

impl Mapper for UserGroupsMapper {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config_map_name(&self) -> &'static str {
        CONFIG_MAP_NAME
    }

    fn get_data(
        &self,
        users: &[DirectoryEntry],
        groups: &[DirectoryEntry],
    ) -> Result<MapperData, MapperError> {
        debug!(scheme = %self.scheme, users = users.len(), groups = groups.len(), "mapper running");

        let user_index = NameIndex::build(users, &self.user_name_attr);
        let group_index = NameIndex::build(groups, &self.group_name_attr);
        let gid_index = GidIndex::build(groups, &self.group_name_attr, &self.group_gid_attr);

        let table = if self.scheme.is_user_centric() {
            MembershipTable::default()
        } else {
            let table = self.extract_from_groups(groups, &user_index);
            if table.is_empty() {
                debug!(attr = self.scheme.attribute(), "no memberships listed on group entries");
            } else {
                debug!(members = table.len(), "membership table built");
            }
            table
        };

        let mut data = MapperData::new();
        for user in users {
            let name = user.value(&self.user_name_attr);
            let key = format!("{}{}", self.prefix, name);

            let mut user_groups = if self.scheme.is_user_centric() {
                self.extract_from_user(user, &group_index)
            } else {
                table.groups_of(name).to_vec()
            };

            if let Some(primary) = gid_index.get(user.value(&self.user_gid_attr)) {
                put_first(&mut user_groups, primary);
            }

            let value = match serde_json::to_string(&user_groups) {
                Ok(json) => json,
                Err(e) => {
                    warn!(user = %name, error = %e, "failed to encode group list");
                    "[]".to_string()
                }
            };
            data.insert(key, value);
        }

        debug!(user_groups = data.len(), "mapper complete");
        Ok(data)
    }
}
