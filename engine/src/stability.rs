//! Write-completion detection.
//!
//! Size stability alone is not enough to decide that a writer is done: the
//! OS can hold the writer's lock briefly after the final flush. A file is
//! therefore treated as ready only once its size has stopped changing for
//! several consecutive samples *and* it can be opened for read-write access.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use mirrorsync_config::Mapping;

/// Consecutive equal size samples required before the openable probe runs.
const STABLE_SAMPLES: u32 = 3;

/// Timing parameters for one stability wait.
#[derive(Debug, Clone, Copy)]
pub struct StabilityPolicy {
    /// Unconditional delay before the first sample.
    pub initial_delay: Duration,

    /// Interval between size samples.
    pub check_interval: Duration,

    /// Overall deadline for the wait.
    pub timeout: Duration,
}

impl StabilityPolicy {
    /// Take the timing parameters from a mapping.
    pub fn from_mapping(mapping: &Mapping) -> Self {
        Self {
            initial_delay: mapping.initial_delay(),
            check_interval: mapping.check_interval(),
            timeout: mapping.wait_timeout(),
        }
    }
}

/// Wait until `path` has finished being written, or until the policy's
/// timeout elapses.
///
/// Returns `true` once the file's size is unchanged across three
/// consecutive samples and the file is openable for read-write access. Stat errors (the file briefly missing or locked)
/// reset the streak but never abort the wait. Returns `false` on timeout
/// or cancellation.
pub async fn await_ready(
    path: &Path,
    policy: &StabilityPolicy,
    cancel: &CancellationToken,
) -> bool {
    // Let the write burst begin before sampling.
    if !policy.initial_delay.is_zero() && !sleep_or_cancel(policy.initial_delay, cancel).await {
        return false;
    }

    let start = Instant::now();
    let mut last_size: Option<u64> = None;
    let mut streak = 0u32;

    while start.elapsed() < policy.timeout {
        match std::fs::metadata(path) {
            Ok(meta) => {
                let size = meta.len();
                if last_size == Some(size) {
                    streak += 1;
                    if streak >= STABLE_SAMPLES && is_openable(path) {
                        debug!(
                            path = %path.display(),
                            size,
                            waited_ms = start.elapsed().as_millis() as u64,
                            "file ready"
                        );
                        return true;
                    }
                } else {
                    streak = 0;
                    last_size = Some(size);
                    debug!(path = %path.display(), size, "file size changed");
                }
            }
            Err(_) => {
                // Missing or locked; keep polling until the deadline.
                streak = 0;
            }
        }

        if !sleep_or_cancel(policy.check_interval, cancel).await {
            return false;
        }
    }

    warn!(
        path = %path.display(),
        waited_ms = start.elapsed().as_millis() as u64,
        "timed out waiting for file to become ready"
    );
    false
}

/// Probe whether the writer has released the file: open read-write and seek
/// to the end.
fn is_openable(path: &Path) -> bool {
    match OpenOptions::new().read(true).write(true).open(path) {
        Ok(mut file) => file.seek(SeekFrom::End(0)).is_ok(),
        Err(_) => false,
    }
}

/// Sleep for `duration`, returning `false` if cancelled first.
pub(crate) async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}
