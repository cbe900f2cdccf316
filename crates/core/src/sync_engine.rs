//! One fetch-map-publish cycle.
//!
//! The [`SyncEngine`] owns the configured mappers and the publisher. Given a
//! materialized [`DirectorySnapshot`] it runs every mapper and publishes each
//! result under the mapper's config map name. A failing mapper does not stop
//! the others; the cycle only fails when none of them succeeded.
//!
//! A lock flag prevents concurrent cycles.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::MappingConfig;
use crate::directory::DirectorySnapshot;
use crate::errors::{CoreError, MapperError, SyncError};
use crate::mapper::{Mapper, MapperRegistry};
use crate::publish::Publisher;

/// Statistics from a single cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    pub users: usize,
    pub groups: usize,
    pub mappers_run: usize,
    pub mappers_failed: usize,
    pub keys_published: usize,
}

/// Runs the configured mappers over directory snapshots.
pub struct SyncEngine {
    mappers: Vec<Box<dyn Mapper>>,
    publisher: Box<dyn Publisher>,
    running: AtomicBool,
}

impl SyncEngine {
    /// Build every mapper named in `mapping` from `registry`.
    ///
    /// Unknown mappers and missing attribute roles are reported here rather
    /// than on the first cycle.
    pub fn new(
        mapping: &MappingConfig,
        registry: &MapperRegistry,
        publisher: Box<dyn Publisher>,
    ) -> Result<Self, MapperError> {
        let mappers = mapping
            .mappers
            .iter()
            .map(|name| registry.build(name, mapping))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            mappers = ?mappers.iter().map(|m| m.name()).collect::<Vec<_>>(),
            scheme = %mapping.member_scheme,
            "initialized sync engine"
        );
        Ok(Self {
            mappers,
            publisher,
            running: AtomicBool::new(false),
        })
    }

    /// Names of the mappers run each cycle, in configuration order.
    pub fn mapper_names(&self) -> Vec<&'static str> {
        self.mappers.iter().map(|m| m.name()).collect()
    }

    /// Check if a cycle is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run every mapper over `snapshot` and publish the results.
    pub fn run_cycle(&self, snapshot: &DirectorySnapshot) -> Result<CycleStats, SyncError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::AlreadyRunning);
        }

        let result = self.run_mappers(snapshot);
        self.running.store(false, Ordering::SeqCst);
        result
    }

    fn run_mappers(&self, snapshot: &DirectorySnapshot) -> Result<CycleStats, SyncError> {
        let mut stats = CycleStats {
            users: snapshot.users.len(),
            groups: snapshot.groups.len(),
            ..Default::default()
        };

        for mapper in &self.mappers {
            stats.mappers_run += 1;
            match self.run_mapper(mapper.as_ref(), snapshot) {
                Ok(keys) => stats.keys_published += keys,
                Err(e) => {
                    stats.mappers_failed += 1;
                    error!(mapper = mapper.name(), error = %e, "mapper failed");
                }
            }
        }

        if stats.mappers_run > 0 && stats.mappers_failed == stats.mappers_run {
            return Err(SyncError::AllMappersFailed(stats.mappers_failed));
        }

        info!(
            users = stats.users,
            groups = stats.groups,
            mappers = stats.mappers_run,
            failed = stats.mappers_failed,
            keys = stats.keys_published,
            "cycle complete"
        );
        Ok(stats)
    }

    fn run_mapper(&self, mapper: &dyn Mapper, snapshot: &DirectorySnapshot) -> Result<usize, CoreError> {
        debug!(mapper = mapper.name(), "running mapper");
        let data = mapper.get_data(&snapshot.users, &snapshot.groups)?;
        self.publisher.publish(mapper.config_map_name(), &data)?;
        Ok(data.len())
    }
}
