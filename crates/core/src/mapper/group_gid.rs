//! Group name -> gid.

use tracing::debug;

use super::{Mapper, MapperData};
use crate::config::MappingConfig;
use crate::directory::DirectoryEntry;
use crate::errors::MapperError;

pub const NAME: &str = "group-gid";
pub const CONFIG_MAP_NAME: &str = "group-gid-map";

/// Publishes each group name mapped to its gid.
#[derive(Debug, Clone)]
pub struct GroupGidMapper {
    name_attr: String,
    gid_attr: String,
}

impl GroupGidMapper {
    pub fn new(config: &MappingConfig) -> Self {
        Self {
            name_attr: config.group_attr("name").to_string(),
            gid_attr: config.group_attr("gid").to_string(),
        }
    }
}

impl Mapper for GroupGidMapper {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config_map_name(&self) -> &'static str {
        CONFIG_MAP_NAME
    }

    fn get_data(
        &self,
        _users: &[DirectoryEntry],
        groups: &[DirectoryEntry],
    ) -> Result<MapperData, MapperError> {
        let mut data = MapperData::new();
        for group in groups {
            let name = group.value(&self.name_attr);
            let gid = group.value(&self.gid_attr);
            if name.is_empty() || gid.is_empty() {
                debug!(dn = %group.dn, "skipping group without name or gid");
                continue;
            }
            data.insert(name.to_string(), gid.to_string());
        }
        debug!(group_gids = data.len(), "mapper complete");
        Ok(data)
    }
}
