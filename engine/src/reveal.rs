//! Best-effort "open this directory in the file browser" side effect.

use std::path::Path;

use tracing::{debug, warn};

/// Ask the desktop shell to open `path`. Failure is logged and swallowed;
/// the copy that triggered the reveal has already succeeded.
pub fn reveal_dir(path: &Path) {
    match opener::open(path) {
        Ok(()) => debug!(path = %path.display(), "opened target directory"),
        Err(err) => warn!(path = %path.display(), error = %err, "could not open target directory"),
    }
}
