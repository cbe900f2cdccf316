//! Username -> primary gid.

use tracing::debug;

use super::{Mapper, MapperData};
use crate::config::MappingConfig;
use crate::directory::DirectoryEntry;
use crate::errors::MapperError;

pub const NAME: &str = "user-gid";
pub const CONFIG_MAP_NAME: &str = "user-gid-map";

/// Publishes `prefix + username` mapped to the user's gid.
///
/// Users lacking either a name or a gid are skipped.
#[derive(Debug, Clone)]
pub struct UserGidMapper {
    prefix: String,
    name_attr: String,
    gid_attr: String,
}

impl UserGidMapper {
    pub fn new(config: &MappingConfig) -> Self {
        Self {
            prefix: config.user_prefix.clone(),
            name_attr: config.user_attr("name").to_string(),
            gid_attr: config.user_attr("gid").to_string(),
        }
    }
}

impl Mapper for UserGidMapper {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config_map_name(&self) -> &'static str {
        CONFIG_MAP_NAME
    }

    fn get_data(
        &self,
        users: &[DirectoryEntry],
        _groups: &[DirectoryEntry],
    ) -> Result<MapperData, MapperError> {
        let mut data = MapperData::new();
        for user in users {
            let name = user.value(&self.name_attr);
            let gid = user.value(&self.gid_attr);
            if name.is_empty() || gid.is_empty() {
                debug!(dn = %user.dn, "skipping user without name or gid");
                continue;
            }
            data.insert(format!("{}{}", self.prefix, name), gid.to_string());
        }
        debug!(user_gids = data.len(), "mapper complete");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_gid() {
        let config = MappingConfig {
            user_prefix: "user.".into(),
            ..Default::default()
        };
        let users = vec![
            DirectoryEntry::new("uid=alice,dc=x")
                .with_attr("uid", "alice")
                .with_attr("gidNumber", "100"),
            DirectoryEntry::new("uid=nogid,dc=x").with_attr("uid", "nogid"),
        ];

        let data = UserGidMapper::new(&config).get_data(&users, &[]).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data["user.alice"], "100");
    }
}
