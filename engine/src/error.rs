//! Error types for the sync engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur in the sync engine.
///
/// Copy and stability failures are deliberately absent: they are logged and
/// absorbed inside the per-mapping pipeline so that no event-time failure
/// ever terminates a watcher.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] mirrorsync_config::ConfigError),

    /// The directory containing a mapping's source file does not exist.
    #[error("source directory does not exist: {0}")]
    SourceDirMissing(PathBuf),

    /// Filesystem notification error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
