//! The copy step: mirror one file into the target directory, retrying
//! around transient lock contention.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use filetime::FileTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::reveal;
use crate::stability::sleep_or_cancel;

/// Total attempts before a copy is reported as failed.
const MAX_ATTEMPTS: u32 = 5;

/// First backoff delay; doubled after every lock error.
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Copy `source` into `target_dir`, retrying on failure.
///
/// Lock errors back off exponentially (0.5 s, 1 s, 2 s, 4 s); other errors
/// retry on a fixed 0.5 s delay. The outcome is reported as a bool and
/// logged: a failed copy never escalates beyond this function, so the
/// calling watcher stays alive for the next event.
pub async fn copy_with_retry(
    source: &Path,
    target_dir: &Path,
    open_after: bool,
    cancel: &CancellationToken,
) -> bool {
    let Some(file_name) = source.file_name() else {
        error!(source = %source.display(), "source path has no file name");
        return false;
    };

    if let Err(err) = fs::create_dir_all(target_dir) {
        error!(
            target = %target_dir.display(),
            error = %err,
            "could not create target directory"
        );
        return false;
    }

    let target = target_dir.join(file_name);
    let mut backoff = INITIAL_BACKOFF;

    for attempt in 1..=MAX_ATTEMPTS {
        match copy_once(source, &target) {
            Ok(bytes) => {
                info!(
                    source = %source.display(),
                    target = %target.display(),
                    bytes,
                    attempt,
                    "file copied"
                );
                if open_after {
                    reveal::reveal_dir(target_dir);
                }
                return true;
            }
            Err(err) if attempt == MAX_ATTEMPTS => {
                error!(
                    source = %source.display(),
                    target = %target.display(),
                    attempts = MAX_ATTEMPTS,
                    error = %err,
                    "copy failed, attempts exhausted"
                );
                return false;
            }
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                warn!(
                    target = %target.display(),
                    attempt,
                    retry_in_ms = backoff.as_millis() as u64,
                    "target locked, backing off"
                );
                if !sleep_or_cancel(backoff, cancel).await {
                    debug!(target = %target.display(), "copy abandoned on shutdown");
                    return false;
                }
                backoff *= 2;
            }
            Err(err) => {
                warn!(
                    target = %target.display(),
                    attempt,
                    error = %err,
                    "copy attempt failed, retrying"
                );
                if !sleep_or_cancel(INITIAL_BACKOFF, cancel).await {
                    debug!(target = %target.display(), "copy abandoned on shutdown");
                    return false;
                }
            }
        }
    }

    false
}

/// One attempt: replace the target file with a byte copy of the source,
/// carrying over permissions and the modification time.
fn copy_once(source: &Path, target: &Path) -> io::Result<u64> {
    if target.exists() {
        fs::remove_file(target)?;
    }

    let bytes = fs::copy(source, target)?;

    let meta = fs::metadata(source)?;
    filetime::set_file_mtime(target, FileTime::from_last_modification_time(&meta))?;

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_copy_preserves_bytes_and_mtime() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("report.csv");
        fs::write(&source, b"a,b,c\n1,2,3\n").unwrap();

        // Pin the source mtime well into the past so preservation is visible.
        let past = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&source, past).unwrap();

        let target_dir = dir.path().join("out");
        let cancel = CancellationToken::new();
        assert!(copy_with_retry(&source, &target_dir, false, &cancel).await);

        let target = target_dir.join("report.csv");
        assert_eq!(fs::read(&target).unwrap(), b"a,b,c\n1,2,3\n");

        let copied_mtime = FileTime::from_last_modification_time(&fs::metadata(&target).unwrap());
        assert_eq!(copied_mtime, past);
    }

    #[tokio::test]
    async fn test_copy_replaces_existing_target() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("data.bin");
        fs::write(&source, b"new").unwrap();

        let target_dir = dir.path().join("out");
        fs::create_dir_all(&target_dir).unwrap();
        fs::write(target_dir.join("data.bin"), b"old stale content").unwrap();

        let cancel = CancellationToken::new();
        assert!(copy_with_retry(&source, &target_dir, false, &cancel).await);
        assert_eq!(fs::read(target_dir.join("data.bin")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_missing_source_exhausts_attempts() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("never-existed.txt");
        let target_dir = dir.path().join("out");

        let cancel = CancellationToken::new();
        let start = Instant::now();
        assert!(!copy_with_retry(&source, &target_dir, false, &cancel).await);

        // Four fixed 0.5 s delays between the five attempts.
        assert!(start.elapsed() >= Duration::from_millis(1_900));
    }

    #[tokio::test]
    async fn test_cancellation_abandons_retries() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("never-existed.txt");
        let target_dir = dir.path().join("out");

        let cancel = CancellationToken::new();
        cancel.cancel();

        let start = Instant::now();
        assert!(!copy_with_retry(&source, &target_dir, false, &cancel).await);
        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_reveal_failure_does_not_fail_the_copy() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"x").unwrap();

        // Even when no file browser is available, the copy still succeeds.
        let cancel = CancellationToken::new();
        assert!(copy_with_retry(&source, &dir.path().join("out"), true, &cancel).await);
    }
}
