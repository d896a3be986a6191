//! Error types for configuration handling.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {0}")]
    NotFound(String),

    /// Configuration could not be parsed.
    #[error("configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Configuration is structurally valid but semantically wrong.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
