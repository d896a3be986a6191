//! Background polling for the cross-process reload signal.
//!
//! A sibling process (the config editor) requests a reload by dropping a
//! marker file next to the configuration file. This loop polls for the
//! marker, swaps the supervisor's watch set, and clears it. The marker is
//! best-effort: a missed detection is corrected on the next poll.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use mirrorsync_config::ConfigStore;

use crate::projects;
use crate::stability::sleep_or_cancel;
use crate::supervisor::SyncSupervisor;

/// How often the reload marker is polled.
pub const RELOAD_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Spawn the reload polling loop.
///
/// Each time the marker appears, the configuration is reloaded from disk,
/// projects are re-identified against the persisted flags, and the
/// supervisor's watch set is swapped. A configuration that fails to load
/// leaves the running set untouched; the marker is cleared either way so a
/// broken file does not re-trigger a failing reload every poll.
pub fn spawn_reload_loop(
    supervisor: Arc<Mutex<SyncSupervisor>>,
    store: ConfigStore,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if !sleep_or_cancel(interval, &cancel).await {
                break;
            }

            if !store.reload_requested() {
                continue;
            }
            info!("reload requested via marker file");

            match store.load() {
                Ok(config) => {
                    let projects = projects::identify(&config.mappings, &config.projects);
                    let mut supervisor = supervisor.lock().await;
                    if let Err(err) = supervisor.reload(config.mappings, projects).await {
                        error!(error = %err, "reload failed");
                    }
                }
                Err(err) => {
                    error!(error = %err, "could not reload configuration, keeping current watch set");
                }
            }

            store.clear_reload_request();
        }
    })
}
