//! Publishing scheduler that fetches the directory and runs a cycle on a
//! configurable interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time;
use tracing::{error, info, warn};

use ldapmap_core::errors::{CoreError, SyncError};
use ldapmap_core::sync_engine::CycleStats;
use ldapmap_core::{LdapDirectory, SyncEngine};

/// Tracks aggregate statistics across cycles.
#[derive(Default)]
pub struct SchedulerStats {
    pub total_cycles: AtomicU64,
    pub total_errors: AtomicU64,
    pub consecutive_errors: AtomicU64,
}

/// Runs a fetch-map-publish cycle on a timer.
///
/// If the previous cycle is still running when the timer fires, the tick is
/// skipped rather than queued.
pub struct Scheduler {
    engine: Arc<SyncEngine>,
    directory: LdapDirectory,
    interval: Duration,
    stats: Arc<SchedulerStats>,
}

impl Scheduler {
    pub fn new(engine: Arc<SyncEngine>, directory: LdapDirectory, interval: Duration) -> Self {
        Self {
            engine,
            directory,
            interval,
            stats: Arc::new(SchedulerStats::default()),
        }
    }

    /// Main scheduler loop. Returns once `shutdown` is notified.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        info!(interval_secs = self.interval.as_secs(), "scheduler started");

        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.maybe_run_cycle().await;
                }
                _ = shutdown.notified() => {
                    info!("scheduler stopping");
                    return;
                }
            }
        }
    }

    /// Fetch and publish once.
    pub async fn run_once(&self) -> Result<CycleStats, CoreError> {
        if self.engine.is_running() {
            return Err(SyncError::AlreadyRunning.into());
        }
        let snapshot = self.directory.fetch().await?;
        Ok(self.engine.run_cycle(&snapshot)?)
    }

    async fn maybe_run_cycle(&self) {
        let cycle = self.stats.total_cycles.fetch_add(1, Ordering::SeqCst) + 1;
        info!(cycle, "starting cycle");

        match self.run_once().await {
            Ok(stats) => {
                self.stats.consecutive_errors.store(0, Ordering::SeqCst);
                info!(
                    cycle,
                    keys = stats.keys_published,
                    failed_mappers = stats.mappers_failed,
                    "cycle completed"
                );
            }
            Err(CoreError::Sync(SyncError::AlreadyRunning)) => {
                warn!(cycle, "skipping cycle: previous cycle still running");
            }
            Err(e) => {
                let errors = self.stats.total_errors.fetch_add(1, Ordering::SeqCst) + 1;
                let consecutive = self.stats.consecutive_errors.fetch_add(1, Ordering::SeqCst) + 1;
                error!(
                    cycle,
                    error = %e,
                    total_errors = errors,
                    consecutive_errors = consecutive,
                    "cycle failed"
                );
            }
        }
    }
}
