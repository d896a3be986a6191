//! Cross-process reload signaling.
//!
//! A marker file next to the configuration file means "reload requested".
//! Creation and removal are best-effort: a race merely delays the reload
//! until the next poll, and a missed removal re-triggers one harmless
//! reload.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::error::Result;
use crate::store::ConfigStore;

/// Name of the reload marker file, created in the configuration directory.
pub const RELOAD_MARKER: &str = ".reload-request";

impl ConfigStore {
    /// Path of the reload marker file.
    pub fn reload_marker_path(&self) -> PathBuf {
        self.dir().join(RELOAD_MARKER)
    }

    /// Whether a reload has been requested.
    pub fn reload_requested(&self) -> bool {
        self.reload_marker_path().exists()
    }

    /// Request a reload from another process (or the config editor).
    pub fn request_reload(&self) -> Result<()> {
        fs::write(self.reload_marker_path(), b"")?;
        debug!("reload requested");
        Ok(())
    }

    /// Clear a pending reload request. Missing markers are not an error.
    pub fn clear_reload_request(&self) {
        let marker = self.reload_marker_path();
        if let Err(err) = fs::remove_file(&marker) {
            if err.kind() != std::io::ErrorKind::NotFound {
                debug!(path = %marker.display(), error = %err, "could not remove reload marker");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_marker_lifecycle() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));

        assert!(!store.reload_requested());
        store.request_reload().unwrap();
        assert!(store.reload_requested());

        store.clear_reload_request();
        assert!(!store.reload_requested());

        // Clearing twice is harmless.
        store.clear_reload_request();
    }
}
