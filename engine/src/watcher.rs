//! The per-mapping watcher: filter, debounce, await stability, copy.
//!
//! One `MappingWatcher` owns one mapping. It consumes change events for the
//! source file's directory, narrows them to the mapped file, collapses
//! duplicate notifications for a single logical write, optionally waits for
//! the writer to finish, and then runs the copy. Events for one mapping are
//! processed strictly in arrival order; watchers for different mappings run
//! independently.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use mirrorsync_config::Mapping;

use crate::copy::copy_with_retry;
use crate::error::Result;
use crate::event::{ChangeEvent, ChangeKind};
use crate::stability::{StabilityPolicy, await_ready};

/// Default window for collapsing duplicate notifications of one write.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

/// Capacity of the channel bridging notify callbacks to the consumer loop.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Consumer of change events for a single mapping.
pub struct MappingWatcher {
    /// The mapping snapshot, immutable for this watcher's lifetime.
    mapping: Arc<Mapping>,

    /// Canonical form of the source path, for event filtering.
    resolved_source: PathBuf,

    /// Modification-time delta below which an event is a duplicate.
    debounce_window: Duration,

    /// Last observed modification time per event path. Private to this
    /// watcher; no cross-mapping sharing.
    last_seen_mtime: HashMap<PathBuf, SystemTime>,
}

impl MappingWatcher {
    /// Create a watcher for one mapping.
    pub fn new(mapping: Arc<Mapping>) -> Self {
        let resolved_source =
            dunce::canonicalize(&mapping.source_file).unwrap_or_else(|_| mapping.source_file.clone());

        Self {
            mapping,
            resolved_source,
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            last_seen_mtime: HashMap::new(),
        }
    }

    /// Override the debounce window. Not exposed through configuration.
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// The mapping this watcher serves.
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Consume events until the channel closes or the token is cancelled.
    ///
    /// Each event is processed to completion before the next one is
    /// accepted, so copies for one mapping never overlap.
    pub async fn run(mut self, mut rx: mpsc::Receiver<ChangeEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Some(event) => {
                        self.handle_event(&event, &cancel).await;
                    }
                    None => break,
                },
            }
        }

        debug!(source = %self.mapping.source_file.display(), "watcher stopped");
    }

    /// Process one change event. Returns whether a copy was performed.
    pub async fn handle_event(&mut self, event: &ChangeEvent, cancel: &CancellationToken) -> bool {
        if !event.is_content_change() {
            return false;
        }

        if !self.matches_source(&event.path) {
            return false;
        }

        if !event.path.exists() {
            return false;
        }

        // The debounce sample; a stat failure here usually means the writer
        // still holds the file, and a follow-up notification will arrive.
        let Ok(mtime) = std::fs::metadata(&event.path).and_then(|meta| meta.modified()) else {
            debug!(path = %event.path.display(), "could not stat file, skipping event");
            return false;
        };

        if self.is_duplicate(&event.path, mtime) {
            debug!(path = %event.path.display(), "duplicate notification suppressed");
            return false;
        }
        self.last_seen_mtime.insert(event.path.clone(), mtime);

        if self.mapping.wait_for_complete {
            let policy = StabilityPolicy::from_mapping(&self.mapping);
            if !await_ready(&event.path, &policy, cancel).await {
                warn!(
                    path = %event.path.display(),
                    "file did not become ready in time, skipping copy"
                );
                return false;
            }
        }

        copy_with_retry(
            &event.path,
            &self.mapping.target_dir,
            self.mapping.open_dir,
            cancel,
        )
        .await
    }

    /// Whether an event path refers to this watcher's source file.
    fn matches_source(&self, path: &Path) -> bool {
        if path == self.mapping.source_file || path == self.resolved_source {
            return true;
        }
        match dunce::canonicalize(path) {
            Ok(canonical) => canonical == self.resolved_source,
            Err(_) => false,
        }
    }

    /// Whether `mtime` falls inside the debounce window of the last event
    /// for this path. A modification time that moved backwards counts as a
    /// duplicate as well.
    fn is_duplicate(&self, path: &Path, mtime: SystemTime) -> bool {
        match self.last_seen_mtime.get(path) {
            Some(last) => match mtime.duration_since(*last) {
                Ok(delta) => delta < self.debounce_window,
                Err(_) => true,
            },
            None => false,
        }
    }
}

/// Subscribe to the directory containing a mapping's source file.
///
/// Returns the notify handle (which must stay alive for events to flow)
/// and the receiving end of the bridge channel. Only creation and
/// modification events cross the bridge.
pub(crate) fn subscribe(dir: &Path) -> Result<(RecommendedWatcher, mpsc::Receiver<ChangeEvent>)> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let mut watcher = notify::recommended_watcher(
        move |result: std::result::Result<notify::Event, notify::Error>| match result {
            Ok(event) => {
                let kind = ChangeKind::from(event.kind);
                for path in event.paths {
                    let change = ChangeEvent::new(kind, path);
                    if !change.is_content_change() {
                        continue;
                    }
                    if tx.blocking_send(change).is_err() {
                        // Receiver gone; the session is shutting down.
                        return;
                    }
                }
            }
            Err(err) => error!("watch error: {err}"),
        },
    )?;

    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok((watcher, rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn immediate_mapping(dir: &TempDir) -> Arc<Mapping> {
        let source = dir.path().join("watched.txt");
        fs::write(&source, b"payload").unwrap();
        Arc::new(Mapping::new(source, dir.path().join("out")).copy_immediately())
    }

    fn modified(path: impl Into<PathBuf>) -> ChangeEvent {
        ChangeEvent::new(ChangeKind::Modified, path)
    }

    #[tokio::test]
    async fn test_single_event_copies_without_stability_wait() {
        let dir = TempDir::new().unwrap();
        let mapping = immediate_mapping(&dir);
        let mut watcher = MappingWatcher::new(Arc::clone(&mapping));
        let cancel = CancellationToken::new();

        let start = tokio::time::Instant::now();
        assert!(watcher.handle_event(&modified(&mapping.source_file), &cancel).await);

        // No initial delay, no sampling loop.
        assert!(start.elapsed() < Duration::from_millis(400));
        let copied = mapping.target_dir.join("watched.txt");
        assert_eq!(fs::read(copied).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_events_for_other_paths_are_ignored() {
        let dir = TempDir::new().unwrap();
        let mapping = immediate_mapping(&dir);

        let other = dir.path().join("other.txt");
        fs::write(&other, b"unrelated").unwrap();

        let mut watcher = MappingWatcher::new(Arc::clone(&mapping));
        let cancel = CancellationToken::new();

        assert!(!watcher.handle_event(&modified(other), &cancel).await);
        assert!(!mapping.target_dir.join("other.txt").exists());
        assert!(!mapping.target_dir.join("watched.txt").exists());
    }

    #[tokio::test]
    async fn test_event_for_missing_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mapping = immediate_mapping(&dir);
        let mut watcher = MappingWatcher::new(Arc::clone(&mapping));
        let cancel = CancellationToken::new();

        let ghost = dir.path().join("gone.txt");
        assert!(!watcher.handle_event(&modified(ghost), &cancel).await);
    }

    #[tokio::test]
    async fn test_duplicate_notifications_are_debounced() {
        let dir = TempDir::new().unwrap();
        let mapping = immediate_mapping(&dir);
        let mut watcher = MappingWatcher::new(Arc::clone(&mapping));
        let cancel = CancellationToken::new();

        let event = modified(&mapping.source_file);
        assert!(watcher.handle_event(&event, &cancel).await);

        // Same mtime: inside the window, suppressed.
        assert!(!watcher.handle_event(&event, &cancel).await);

        // A write two seconds later clears the window.
        let later = FileTime::from_system_time(SystemTime::now() + Duration::from_secs(2));
        filetime::set_file_mtime(&mapping.source_file, later).unwrap();
        assert!(watcher.handle_event(&event, &cancel).await);
    }

    #[tokio::test]
    async fn test_backwards_mtime_counts_as_duplicate() {
        let dir = TempDir::new().unwrap();
        let mapping = immediate_mapping(&dir);
        let mut watcher = MappingWatcher::new(Arc::clone(&mapping));
        let cancel = CancellationToken::new();

        let event = modified(&mapping.source_file);
        assert!(watcher.handle_event(&event, &cancel).await);

        let earlier = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(60));
        filetime::set_file_mtime(&mapping.source_file, earlier).unwrap();
        assert!(!watcher.handle_event(&event, &cancel).await);
    }

    #[tokio::test]
    async fn test_stability_wait_runs_when_enabled() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("slow.txt");
        fs::write(&source, b"complete").unwrap();

        let mut mapping = Mapping::new(&source, dir.path().join("out"));
        mapping.initial_delay = 0.0;
        mapping.check_interval = 0.01;
        mapping.wait_timeout = 5.0;
        let mapping = Arc::new(mapping);

        let mut watcher = MappingWatcher::new(Arc::clone(&mapping));
        let cancel = CancellationToken::new();

        assert!(watcher.handle_event(&modified(&source), &cancel).await);
        assert_eq!(fs::read(mapping.target_dir.join("slow.txt")).unwrap(), b"complete");
    }

    #[tokio::test]
    async fn test_non_content_events_are_ignored() {
        let dir = TempDir::new().unwrap();
        let mapping = immediate_mapping(&dir);
        let mut watcher = MappingWatcher::new(Arc::clone(&mapping));
        let cancel = CancellationToken::new();

        let event = ChangeEvent::new(ChangeKind::Other, &mapping.source_file);
        assert!(!watcher.handle_event(&event, &cancel).await);
    }
}
