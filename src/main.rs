//! netwatch - connectivity health monitoring with automated remediation.
//!
//! Probes a pooled target set on a fixed interval, classifies each run,
//! persists samples to SQLite, and power-cycles the modem after a run of
//! consecutive full failures, under a cooldown shared with the manual
//! dashboard trigger.

mod cache;
mod config;
mod db;
mod monitor;
mod probe;
mod remediation;
mod state;
mod web;

use cache::CacheLayer;
use config::Config;
use db::Store;
use monitor::Monitor;
use remediation::{PowerCycler, RemediationController};
use state::CooldownFile;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("netwatch=info".parse()?),
        )
        .init();

    // Load and validate configuration; invalid config refuses to run.
    let cfg = Config::load();
    if let Err(e) = cfg.validate() {
        tracing::error!("invalid configuration: {}", e);
        return Err(e.into());
    }

    tracing::info!(
        "starting netwatch: {} targets x {} probes every {:?}, threshold {}",
        cfg.targets.len(),
        cfg.probes_per_target,
        cfg.run_interval,
        cfg.failure_threshold,
    );
    tracing::info!("using database at {}", cfg.db_path);

    std::fs::create_dir_all(&cfg.state_dir)?;

    // Initialize the store (WAL mode: the monitor writes while the
    // dashboard reads).
    let store = Store::new(&cfg.db_path)?;
    tracing::info!("database initialized successfully");

    // One controller instance serves both trigger paths.
    let device = PowerCycler::from_command(cfg.power_cycle_command.clone(), cfg.power_cycle_timeout);
    if !device.is_configured() {
        tracing::warn!("no power-cycle command configured; remediation is disabled");
    }
    let controller = Arc::new(RemediationController::new(
        device,
        cfg.cooldown,
        CooldownFile::new(&cfg.state_dir, "cooldown"),
        store.clone(),
    ));

    // Start the periodic monitoring loop.
    let monitor = Arc::new(Monitor::new(&cfg, store.clone(), controller.clone()));
    let _stop = monitor.start();

    // Serve the query/trigger API.
    let cache = Arc::new(CacheLayer::new(
        store.clone(),
        cfg.cache_capacity,
        cfg.cache_ttl,
    ));
    let server = Server::new(store, cache, controller, cfg.http_port);
    server.start().await?;

    Ok(())
}
