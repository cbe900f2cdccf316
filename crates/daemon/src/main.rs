//! ldapmap daemon entry point.
//!
//! Loads configuration, builds the mappers and publisher, then fetches the
//! directory and publishes on a fixed interval until a shutdown signal.

mod scheduler;
mod signals;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ldapmap_core::config::AppConfig;
use ldapmap_core::{JsonDirPublisher, LdapDirectory, MapperRegistry, SyncEngine};

use crate::scheduler::Scheduler;
use crate::signals::ShutdownSignals;

/// ldapmap publishing daemon.
#[derive(Parser, Debug)]
#[command(
    name = "ldapmap-daemon",
    version,
    about = "Publish LDAP user and group data as configuration maps"
)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Run a single cycle and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config =
        AppConfig::load_and_resolve(&args.config).context("failed to load configuration")?;

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.daemon.log_level);
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("ldapmap daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Config file   : {}", args.config.display());
    info!("LDAP URL      : {}", config.ldap.url);
    info!("Scheme        : {}", config.mapping.member_scheme);
    info!("Mappers       : {}", config.mapping.mappers.join(", "));
    info!("Output dir    : {}", config.output.dir.display());
    info!("Interval      : {}s", config.daemon.interval_secs);

    let publisher = JsonDirPublisher::new(&config.output.dir);
    let engine = SyncEngine::new(
        &config.mapping,
        &MapperRegistry::builtin(),
        Box::new(publisher),
    )
    .context("failed to build mappers")?;
    let directory = LdapDirectory::new(&config.ldap, &config.mapping);

    let scheduler = Arc::new(Scheduler::new(
        Arc::new(engine),
        directory,
        Duration::from_secs(config.daemon.interval_secs),
    ));

    if args.once {
        let stats = scheduler.run_once().await.context("cycle failed")?;
        info!(
            keys = stats.keys_published,
            failed_mappers = stats.mappers_failed,
            "single cycle complete"
        );
        return Ok(());
    }

    let mut signals = ShutdownSignals::install().context("failed to install signal handlers")?;
    let shutdown = Arc::new(tokio::sync::Notify::new());
    let handle = {
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    let signal = signals.recv().await;
    info!(%signal, "shutdown signal received, stopping...");
    shutdown.notify_one();

    match tokio::time::timeout(Duration::from_secs(10), handle).await {
        Ok(Ok(())) => info!("scheduler stopped gracefully"),
        Ok(Err(e)) => warn!("scheduler task error: {}", e),
        Err(_) => warn!("scheduler did not stop within 10s, forcing shutdown"),
    }

    info!("ldapmap daemon stopped");
    Ok(())
}
