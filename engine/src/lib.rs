//! # mirrorsync engine
//!
//! Watches individual source files and mirrors each one into a target
//! directory once its writer has finished. Change notifications are
//! filtered and debounced per mapping, the file is held until its size is
//! stable and its lock released, and the copy retries around transient
//! lock contention. Mappings are grouped into derived "projects" that can
//! be enabled and disabled as a unit, and the whole watch set hot-swaps on
//! reload without a process restart.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        SyncSupervisor                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Config ──► ProjectGrouper ──► active mapping set            │
//! │                                      │                       │
//! │                                      ▼  (one per mapping)    │
//! │  notify ──► ChangeEvent ──► MappingWatcher                   │
//! │                                │                             │
//! │                 filter / debounce / await stability          │
//! │                                │                             │
//! │                                ▼                             │
//! │                          copy_with_retry ──► target dir      │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod copy;
pub mod error;
pub mod event;
pub mod projects;
pub mod reload;
pub mod stability;
pub mod supervisor;
pub mod watcher;

mod reveal;

pub use copy::copy_with_retry;
pub use error::{EngineError, Result};
pub use event::{ChangeEvent, ChangeKind};
pub use projects::{Project, ProjectMap, UNCLASSIFIED, derive_project_name, identify};
pub use reload::{RELOAD_POLL_INTERVAL, spawn_reload_loop};
pub use stability::{StabilityPolicy, await_ready};
pub use supervisor::SyncSupervisor;
pub use watcher::{DEFAULT_DEBOUNCE_WINDOW, MappingWatcher};
