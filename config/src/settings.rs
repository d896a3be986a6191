//! Global settings carried alongside the mapping list.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default log file name, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "sync_log.txt";

/// Tool-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Where the engine writes its log.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_log_file_defaulted() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.log_file, PathBuf::from(DEFAULT_LOG_FILE));
    }
}
