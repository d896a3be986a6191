//! Lifecycle management for the active watch set.
//!
//! The supervisor owns every live `WatchSession` and is the only place the
//! active set changes: `start` brings up one session per enabled mapping,
//! `reload` atomically replaces the whole set, `stop` tears it down. The
//! mapping list and project map are replaced wholesale, never mutated while
//! sessions are running.

use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mirrorsync_config::{Config, ConfigStore, Mapping, ProjectFlags, Settings};

use crate::error::{EngineError, Result};
use crate::projects::{self, ProjectMap};
use crate::watcher::{self, MappingWatcher};

/// How long `stop` waits for each session task before abandoning it.
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// One live watch: a mapping bound to a directory subscription and the
/// task consuming its events.
struct WatchSession {
    /// Index of the mapping in the current list, for diagnostics.
    index: usize,

    /// Snapshot of the mapping this session serves.
    mapping: Arc<Mapping>,

    /// Keeps the notify subscription alive; dropped on teardown.
    _subscription: RecommendedWatcher,

    /// Cancels the consumer loop and any in-flight timed wait.
    cancel: CancellationToken,

    /// The consumer task.
    task: JoinHandle<()>,
}

/// Owner of the active watch set.
pub struct SyncSupervisor {
    /// Persistence handle, used by the project toggle sequence.
    store: ConfigStore,

    /// Current settings, carried through persistence round-trips.
    settings: Settings,

    /// The full mapping list of the current configuration.
    mappings: Vec<Mapping>,

    /// The current project map.
    projects: ProjectMap,

    /// Live sessions, one per active mapping.
    sessions: Vec<WatchSession>,
}

impl SyncSupervisor {
    /// Create a supervisor with no active sessions.
    pub fn new(store: ConfigStore, settings: Settings) -> Self {
        Self {
            store,
            settings,
            mappings: Vec::new(),
            projects: ProjectMap::new(),
            sessions: Vec::new(),
        }
    }

    /// Start one watch session per mapping whose project is enabled.
    ///
    /// A mapping whose source directory is missing, or whose subscription
    /// cannot be created, is skipped with a warning; the rest proceed.
    pub async fn start(&mut self, mappings: Vec<Mapping>, projects: ProjectMap) -> Result<()> {
        self.mappings = mappings;
        self.projects = projects;

        let active = projects::enabled_indices(&self.projects);
        let considered = self.mappings.len();

        for index in active {
            match self.spawn_session(index) {
                Ok(session) => {
                    info!(
                        mapping = index,
                        source = %session.mapping.source_file.display(),
                        "watching file"
                    );
                    self.sessions.push(session);
                }
                Err(err) => {
                    warn!(mapping = index, error = %err, "skipping mapping");
                }
            }
        }

        info!(
            considered,
            watched = self.sessions.len(),
            projects = self.projects.len(),
            "file watching started"
        );
        Ok(())
    }

    /// Atomically replace the active set.
    ///
    /// Every old session is torn down before any new session starts; once
    /// this returns, the live watchers are exactly the enabled mappings of
    /// the new configuration.
    pub async fn reload(&mut self, mappings: Vec<Mapping>, projects: ProjectMap) -> Result<()> {
        info!("reloading watch set");
        self.stop().await;
        self.start(mappings, projects).await
    }

    /// Flip a project's enabled flag, persist it, and reload.
    ///
    /// Returns `false` when no project with that name exists.
    pub async fn set_project_enabled(&mut self, name: &str, enabled: bool) -> Result<bool> {
        let Some(project) = self.projects.get_mut(name) else {
            return Ok(false);
        };
        project.enabled = enabled;
        info!(project = name, enabled, "project toggled");

        let config = Config {
            mappings: self.mappings.clone(),
            projects: projects::flags_of(&self.projects),
            settings: self.settings.clone(),
        };
        self.store.save(&config).map_err(EngineError::Config)?;

        let mappings = self.mappings.clone();
        let projects = self.projects.clone();
        self.reload(mappings, projects).await?;
        Ok(true)
    }

    /// Tear down all sessions. Idempotent.
    ///
    /// In-flight copies may run to completion, but a session that does not
    /// wind down within the join timeout is abandoned (and its task
    /// aborted) so teardown never blocks indefinitely.
    pub async fn stop(&mut self) {
        if self.sessions.is_empty() {
            return;
        }

        let sessions = std::mem::take(&mut self.sessions);
        for session in &sessions {
            session.cancel.cancel();
        }

        for session in sessions {
            // Dropping the subscription first stops new events at the source.
            drop(session._subscription);

            let mut task = session.task;
            if tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, &mut task).await.is_err() {
                // Consider the session terminated regardless, but make sure
                // it cannot copy behind the new set's back.
                task.abort();
                warn!(
                    mapping = session.index,
                    source = %session.mapping.source_file.display(),
                    "session did not stop within the join timeout"
                );
            }
        }

        info!("file watching stopped");
    }

    /// Number of live sessions.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Whether any session task is still running.
    pub fn is_watching(&self) -> bool {
        self.sessions.iter().any(|s| !s.task.is_finished())
    }

    /// The current project map.
    pub fn projects(&self) -> &ProjectMap {
        &self.projects
    }

    /// The persisted view of the current project flags.
    pub fn project_flags(&self) -> ProjectFlags {
        projects::flags_of(&self.projects)
    }

    /// The current mapping list.
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// The configuration store this supervisor persists through.
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    fn spawn_session(&self, index: usize) -> Result<WatchSession> {
        let mapping = Arc::new(self.mappings[index].clone());

        let source_dir = mapping
            .source_file
            .parent()
            .filter(|dir| dir.exists())
            .ok_or_else(|| {
                EngineError::SourceDirMissing(
                    mapping.source_file.parent().unwrap_or(&mapping.source_file).to_path_buf(),
                )
            })?;

        let (subscription, rx) = watcher::subscribe(source_dir)?;
        let cancel = CancellationToken::new();
        let consumer = MappingWatcher::new(Arc::clone(&mapping));
        let task = tokio::spawn(consumer.run(rx, cancel.clone()));

        Ok(WatchSession {
            index,
            mapping,
            _subscription: subscription,
            cancel,
            task,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirrorsync_config::ProjectFlag;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join("config.json"))
    }

    fn mapping_in(dir: &TempDir, name: &str) -> Mapping {
        let source_dir = dir.path().join(name);
        fs::create_dir_all(&source_dir).unwrap();
        let source = source_dir.join("file.txt");
        fs::write(&source, b"x").unwrap();
        Mapping::new(source, dir.path().join("out").join(name))
    }

    #[tokio::test]
    async fn test_start_and_stop_lifecycle() {
        let dir = TempDir::new().unwrap();
        let mappings = vec![mapping_in(&dir, "a")];
        let projects = projects::identify(&mappings, &ProjectFlags::new());

        let mut supervisor = SyncSupervisor::new(store_in(&dir), Settings::default());
        supervisor.start(mappings, projects).await.unwrap();
        assert_eq!(supervisor.active_sessions(), 1);
        assert!(supervisor.is_watching());

        supervisor.stop().await;
        assert_eq!(supervisor.active_sessions(), 0);

        // Stopping again is a no-op.
        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_missing_source_dir_is_skipped() {
        let dir = TempDir::new().unwrap();
        let good = mapping_in(&dir, "good");
        let bad = Mapping::new(
            dir.path().join("nonexistent").join("file.txt"),
            dir.path().join("out"),
        );

        let mappings = vec![good, bad];
        let projects = projects::identify(&mappings, &ProjectFlags::new());

        let mut supervisor = SyncSupervisor::new(store_in(&dir), Settings::default());
        supervisor.start(mappings, projects).await.unwrap();
        assert_eq!(supervisor.active_sessions(), 1);

        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_disabled_project_is_not_watched() {
        let dir = TempDir::new().unwrap();
        let mappings = vec![mapping_in(&dir, "a")];

        let name = projects::identify(&mappings, &ProjectFlags::new())
            .keys()
            .next()
            .cloned()
            .unwrap();
        let mut previous = ProjectFlags::new();
        previous.insert(name, ProjectFlag { enabled: false });
        let projects = projects::identify(&mappings, &previous);

        let mut supervisor = SyncSupervisor::new(store_in(&dir), Settings::default());
        supervisor.start(mappings, projects).await.unwrap();
        assert_eq!(supervisor.active_sessions(), 0);

        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_reload_replaces_the_active_set() {
        let dir = TempDir::new().unwrap();
        let first = vec![mapping_in(&dir, "a"), mapping_in(&dir, "b")];
        let first_projects = projects::identify(&first, &ProjectFlags::new());

        let mut supervisor = SyncSupervisor::new(store_in(&dir), Settings::default());
        supervisor.start(first, first_projects).await.unwrap();
        assert_eq!(supervisor.active_sessions(), 2);

        let second = vec![mapping_in(&dir, "c")];
        let second_projects = projects::identify(&second, &ProjectFlags::new());
        supervisor.reload(second, second_projects).await.unwrap();
        assert_eq!(supervisor.active_sessions(), 1);
        assert_eq!(supervisor.mappings().len(), 1);

        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_project_toggle_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mappings = vec![mapping_in(&dir, "a")];
        let projects = projects::identify(&mappings, &ProjectFlags::new());
        let name = projects.keys().next().cloned().unwrap();

        let mut supervisor = SyncSupervisor::new(store.clone(), Settings::default());
        supervisor.start(mappings, projects).await.unwrap();
        assert_eq!(supervisor.active_sessions(), 1);

        assert!(supervisor.set_project_enabled(&name, false).await.unwrap());
        assert_eq!(supervisor.active_sessions(), 0);

        // The flag reached disk.
        let saved = store.load().unwrap();
        assert!(!saved.projects[&name].enabled);

        // Unknown projects are reported, not created.
        assert!(!supervisor.set_project_enabled("no-such-project", true).await.unwrap());

        supervisor.stop().await;
    }
}
