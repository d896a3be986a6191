//! The mapping record: one source file mirrored into one target directory.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One source-file-to-target-directory synchronization rule.
///
/// A mapping is identified by its position in the ordered mapping list; it is
/// immutable once loaded and replaced wholesale on reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mapping {
    /// Absolute path of the file to watch.
    pub source_file: PathBuf,

    /// Absolute path of the directory to copy into.
    pub target_dir: PathBuf,

    /// Open the target directory in the file browser after each copy.
    #[serde(default)]
    pub open_dir: bool,

    /// Wait for the writer to finish before copying.
    #[serde(default = "default_wait_for_complete")]
    pub wait_for_complete: bool,

    /// Maximum time to wait for the file to become stable, in seconds.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: f64,

    /// Interval between stability samples, in seconds.
    #[serde(default = "default_check_interval")]
    pub check_interval: f64,

    /// Delay before the first stability sample, in seconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay: f64,
}

fn default_wait_for_complete() -> bool {
    true
}

fn default_wait_timeout() -> f64 {
    10.0
}

fn default_check_interval() -> f64 {
    0.2
}

fn default_initial_delay() -> f64 {
    0.5
}

impl Mapping {
    /// Create a mapping with default timing.
    pub fn new(source_file: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_file: source_file.into(),
            target_dir: target_dir.into(),
            open_dir: false,
            wait_for_complete: default_wait_for_complete(),
            wait_timeout: default_wait_timeout(),
            check_interval: default_check_interval(),
            initial_delay: default_initial_delay(),
        }
    }

    /// Disable the stable-write wait for this mapping.
    pub fn copy_immediately(mut self) -> Self {
        self.wait_for_complete = false;
        self
    }

    /// Open the target directory after each copy.
    pub fn open_after_copy(mut self) -> Self {
        self.open_dir = true;
        self
    }

    /// Maximum stability wait as a [`Duration`].
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.wait_timeout.max(0.0))
    }

    /// Stability sampling interval as a [`Duration`].
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.check_interval.max(0.0))
    }

    /// Initial stability delay as a [`Duration`].
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs_f64(self.initial_delay.max(0.0))
    }
}
