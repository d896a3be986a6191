//! mirrorsync: watch individual files and mirror them into target
//! directories once their writers are done.

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mirrorsync_config::ConfigStore;
use mirrorsync_engine::supervisor::SyncSupervisor;
use mirrorsync_engine::{RELOAD_POLL_INTERVAL, identify, spawn_reload_loop};

/// Watch files and copy each one to its target directory after every
/// finished write.
#[derive(Parser, Debug)]
#[command(name = "mirrorsync", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Write the log here instead of the configured location.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let store = ConfigStore::new(&args.config);
    let config = store
        .load()
        .with_context(|| format!("could not load configuration from {}", args.config.display()))?;

    let mut settings = config.settings.clone();
    if let Some(log_file) = args.log_file {
        settings.log_file = log_file;
    }
    let _log_guard = logging::init(&settings.log_file)?;

    info!("mirrorsync starting");

    if config.mappings.is_empty() {
        bail!("no file mappings configured; add mappings to {} and restart", args.config.display());
    }

    let projects = identify(&config.mappings, &config.projects);
    let enabled: Vec<&str> = projects
        .values()
        .filter(|p| p.enabled)
        .map(|p| p.name.as_str())
        .collect();

    info!(
        mappings = config.mappings.len(),
        projects = projects.len(),
        enabled = enabled.len(),
        "configuration loaded"
    );
    if enabled.is_empty() {
        bail!("all projects are disabled; enable at least one project");
    }
    info!(projects = %enabled.join(", "), "enabled projects");

    let mut supervisor = SyncSupervisor::new(store.clone(), settings);
    supervisor.start(config.mappings, projects).await?;
    if supervisor.active_sessions() == 0 {
        warn!("no mappings could be watched; waiting for a configuration reload");
    }

    let supervisor = Arc::new(Mutex::new(supervisor));
    let cancel = CancellationToken::new();
    let poller = spawn_reload_loop(
        Arc::clone(&supervisor),
        store,
        RELOAD_POLL_INTERVAL,
        cancel.clone(),
    );

    tokio::signal::ctrl_c().await.context("could not listen for shutdown signal")?;
    info!("shutdown signal received");

    cancel.cancel();
    let _ = poller.await;
    supervisor.lock().await.stop().await;

    info!("mirrorsync stopped");
    Ok(())
}
