//! Mappers turn a directory snapshot into a flat `key -> value` map that is
//! published under the mapper's config map name.
//!
//! Available mappers are held in an explicit [`MapperRegistry`]; there is no
//! process-wide registration. Each registration records the attribute roles
//! the mapper reads so configuration can be checked before the first run.

pub mod group_gid;
pub mod resolver;
pub mod user_gid;
pub mod user_groups;

use std::collections::BTreeMap;

use crate::config::MappingConfig;
use crate::directory::DirectoryEntry;
use crate::errors::MapperError;

pub use group_gid::GroupGidMapper;
pub use user_gid::UserGidMapper;
pub use user_groups::UserGroupsMapper;

/// Output of a single mapper run.
pub type MapperData = BTreeMap<String, String>;

/// A strategy for deriving published data from user and group entries.
pub trait Mapper: Send + Sync {
    /// Registry name, e.g. `user-groups`.
    fn name(&self) -> &'static str;

    /// Name the output is published under, e.g. `user-groups-map`.
    fn config_map_name(&self) -> &'static str;

    /// Compute this mapper's data from fully materialized search results.
    fn get_data(
        &self,
        users: &[DirectoryEntry],
        groups: &[DirectoryEntry],
    ) -> Result<MapperData, MapperError>;
}

/// Constructor stored in the registry.
pub type MapperConstructor = fn(&MappingConfig) -> Box<dyn Mapper>;

/// A registered mapper and the attribute roles it needs.
#[derive(Clone)]
pub struct Registration {
    pub name: &'static str,
    pub config_map_name: &'static str,
    /// Roles that must be present in `user_attr_map`.
    pub user_attrs: &'static [&'static str],
    /// Roles that must be present in `group_attr_map`.
    pub group_attrs: &'static [&'static str],
    pub constructor: MapperConstructor,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("config_map_name", &self.config_map_name)
            .field("user_attrs", &self.user_attrs)
            .field("group_attrs", &self.group_attrs)
            .finish()
    }
}

/// Name-keyed table of mapper constructors.
#[derive(Debug, Clone, Default)]
pub struct MapperRegistry {
    mappers: BTreeMap<&'static str, Registration>,
}

impl MapperRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every mapper shipped with this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Registration {
            name: user_groups::NAME,
            config_map_name: user_groups::CONFIG_MAP_NAME,
            user_attrs: &["name", "gid"],
            group_attrs: &["name", "gid"],
            constructor: |config| Box::new(UserGroupsMapper::new(config)),
        });
        registry.register(Registration {
            name: user_gid::NAME,
            config_map_name: user_gid::CONFIG_MAP_NAME,
            user_attrs: &["name", "gid"],
            group_attrs: &[],
            constructor: |config| Box::new(UserGidMapper::new(config)),
        });
        registry.register(Registration {
            name: group_gid::NAME,
            config_map_name: group_gid::CONFIG_MAP_NAME,
            user_attrs: &[],
            group_attrs: &["name", "gid"],
            constructor: |config| Box::new(GroupGidMapper::new(config)),
        });
        registry
    }

    /// Add or replace a registration.
    pub fn register(&mut self, registration: Registration) {
        self.mappers.insert(registration.name, registration);
    }

    /// Registered mapper names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.mappers.keys().copied().collect()
    }

    pub fn get(&self, name: &str) -> Option<&Registration> {
        self.mappers.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.mappers.values()
    }

    /// Look up `name` and verify `config` maps every role it needs.
    pub fn check(&self, name: &str, config: &MappingConfig) -> Result<&Registration, MapperError> {
        let registration = self
            .get(name)
            .ok_or_else(|| MapperError::UnknownMapper(name.to_string()))?;

        let missing = |kind: &'static str, roles: &[&str], map: &crate::config::AttrMap| {
            roles
                .iter()
                .find(|role| map.get(**role).map_or(true, |attr| attr.is_empty()))
                .map(|role| MapperError::MissingAttribute {
                    mapper: name.to_string(),
                    kind,
                    role: role.to_string(),
                })
        };
        if let Some(err) = missing("user", registration.user_attrs, &config.user_attr_map) {
            return Err(err);
        }
        if let Some(err) = missing("group", registration.group_attrs, &config.group_attr_map) {
            return Err(err);
        }

        Ok(registration)
    }

    /// Construct the mapper registered as `name`.
    pub fn build(&self, name: &str, config: &MappingConfig) -> Result<Box<dyn Mapper>, MapperError> {
        let registration = self.check(name, config)?;
        Ok((registration.constructor)(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let registry = MapperRegistry::builtin();
        assert_eq!(registry.names(), vec!["group-gid", "user-gid", "user-groups"]);
    }

    #[test]
    fn test_build_known_mapper() {
        let registry = MapperRegistry::builtin();
        let mapper = registry
            .build("user-groups", &MappingConfig::default())
            .unwrap();
        assert_eq!(mapper.name(), "user-groups");
        assert_eq!(mapper.config_map_name(), "user-groups-map");
    }

    #[test]
    fn test_build_unknown_mapper() {
        let registry = MapperRegistry::builtin();
        let result = registry.build("user-shells", &MappingConfig::default());
        assert!(matches!(result, Err(MapperError::UnknownMapper(ref n)) if n == "user-shells"));
    }

    #[test]
    fn test_missing_role_is_rejected() {
        let registry = MapperRegistry::builtin();
        let mut config = MappingConfig::default();
        config.user_attr_map.insert("gid".into(), String::new());

        let result = registry.check("user-groups", &config);
        assert!(matches!(
            result,
            Err(MapperError::MissingAttribute { kind: "user", ref role, .. }) if role == "gid"
        ));

        // group-gid never reads user entries.
        assert!(registry.check("group-gid", &config).is_ok());
    }

    #[test]
    fn test_empty_registry() {
        let registry = MapperRegistry::new();
        assert!(registry.names().is_empty());
        assert!(registry.get("user-groups").is_none());
    }

    #[test]
    fn test_register_custom() {
        struct Empty;
        impl Mapper for Empty {
            fn name(&self) -> &'static str {
                "empty"
            }
            fn config_map_name(&self) -> &'static str {
                "empty-map"
            }
            fn get_data(
                &self,
                _users: &[DirectoryEntry],
                _groups: &[DirectoryEntry],
            ) -> Result<MapperData, MapperError> {
                Ok(MapperData::new())
            }
        }

        let mut registry = MapperRegistry::new();
        registry.register(Registration {
            name: "empty",
            config_map_name: "empty-map",
            user_attrs: &[],
            group_attrs: &[],
            constructor: |_| Box::new(Empty),
        });
        let mapper = registry.build("empty", &MappingConfig::default()).unwrap();
        assert!(mapper.get_data(&[], &[]).unwrap().is_empty());
    }
}
