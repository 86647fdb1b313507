//! VaultSync daemon entry point.
//!
//! Loads configuration, opens the store and keystore, schedules every
//! repository with auto-sync enabled, keeps schedules reconciled against
//! the store, and handles graceful shutdown.

mod connectivity;
mod scheduler;
mod signals;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vaultsync_core::config::AppConfig;
use vaultsync_core::db::Database;
use vaultsync_core::keystore::TokenStore;
use vaultsync_core::sync::SyncManager;

use connectivity::ConnectivityChecker;
use scheduler::{AutoSyncScheduler, RetryPolicy};

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// VaultSync background auto-sync daemon.
#[derive(Parser, Debug)]
#[command(
    name = "vaultsync-daemon",
    version,
    about = "Recurring background synchronization for VaultSync vaults"
)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Write daily-rotated log files into this directory instead of stderr.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;
    config.validate().context("configuration validation failed")?;

    let log_level = args.log_level.as_deref().unwrap_or(&config.app.log_level);
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Keep the appender guard alive for the whole process.
    let _log_guard = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "vaultsync-daemon.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .init();
            None
        }
    };

    info!("========================================");
    info!("  VaultSync Daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Data dir       : {}", config.app.data_dir.display());
    info!(
        "Connectivity   : {}",
        if config.scheduler.assume_online {
            "assumed online".to_string()
        } else {
            format!(
                "{}:{}",
                config.scheduler.connectivity_host, config.scheduler.connectivity_port
            )
        }
    );
    info!("Reconcile every: {}s", config.scheduler.reconcile_interval_secs);
    info!("Log level      : {}", log_level);
    info!("========================================");

    std::fs::create_dir_all(&config.app.data_dir).context("failed to create data directory")?;

    let db = Arc::new(Database::new(config.db_path()).context("failed to open database")?);
    db.initialize()
        .context("failed to initialize database schema")?;
    let tokens =
        Arc::new(TokenStore::open(&config.app.data_dir).context("failed to open keystore")?);
    let manager = Arc::new(SyncManager::new(db.clone(), tokens, &config));

    let scheduler = Arc::new(AutoSyncScheduler::new(
        manager,
        ConnectivityChecker::from_config(&config.scheduler),
        RetryPolicy::from_config(&config.scheduler),
    ));

    // Initial schedules, then keep them reconciled so CLI edits to
    // auto-sync settings propagate without any IPC.
    let repos = db.list_repositories().context("failed to list repositories")?;
    scheduler.reconcile(&repos);
    info!(scheduled = scheduler.active_count(), "initial schedules registered");

    let reconcile_interval = Duration::from_secs(config.scheduler.reconcile_interval_secs);
    let reconcile_db = db.clone();
    let reconcile_scheduler = scheduler.clone();
    let reconcile_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(reconcile_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match reconcile_db.list_repositories() {
                Ok(repos) => reconcile_scheduler.reconcile(&repos),
                Err(e) => warn!(error = %e, "store scan failed, keeping current schedules"),
            }
        }
    });

    let signal = signals::wait_for_shutdown().await;
    info!(%signal, "shutdown signal received, stopping...");

    reconcile_handle.abort();
    scheduler.shutdown();

    info!("VaultSync daemon stopped.");
    Ok(())
}
