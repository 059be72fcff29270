//! Working-directory lifecycle for normalized intermediates.
//!
//! The working directory uses a deterministic, job-derived path so a stale
//! directory left by a crashed run can be found and removed before the next
//! one starts. Removal after a job retries with backoff because encoder
//! processes can hold file locks for a short window after exiting.

use std::path::Path;
use std::time::Duration;

use log::{debug, warn};

use crate::error::CoreResult;

/// How many removal attempts are made before giving up.
pub const REMOVE_RETRY_ATTEMPTS: u32 = 5;

/// Delay before the second removal attempt; doubles each attempt after that.
pub const REMOVE_RETRY_INITIAL_DELAY: Duration = Duration::from_millis(200);

/// Backoff multiplier between removal attempts.
pub const REMOVE_RETRY_BACKOFF_MULTIPLIER: u32 = 2;

/// Runs `op` up to `attempts` times, sleeping `initial_delay` multiplied by
/// `multiplier` after each failure. Returns the first success or the last
/// error.
pub fn retry_with_backoff<T, E, F>(
    attempts: u32,
    initial_delay: Duration,
    multiplier: u32,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
{
    let mut delay = initial_delay;
    let mut last_err = None;
    for attempt in 1..=attempts.max(1) {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) => {
                last_err = Some(e);
                if attempt < attempts {
                    std::thread::sleep(delay);
                    delay *= multiplier;
                }
            }
        }
    }
    // attempts >= 1, so at least one op() ran and last_err is set
    Err(last_err.expect("retry loop ran at least once"))
}

/// Prepares a clean working directory: removes any stale directory from a
/// previous crashed run, then creates it fresh.
pub fn ensure_clean_dir(dir: &Path) -> CoreResult<()> {
    if dir.exists() {
        debug!("Removing stale working directory {}", dir.display());
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Removes the working directory after a job, retrying with backoff to ride
/// out transient file locks. Returns whether removal succeeded; on final
/// failure a warning is logged and the job result is unaffected — operators
/// clean up manually in the rare lock-contention case.
pub fn remove_dir_with_retry(dir: &Path) -> bool {
    if !dir.exists() {
        return true;
    }
    let result = retry_with_backoff(
        REMOVE_RETRY_ATTEMPTS,
        REMOVE_RETRY_INITIAL_DELAY,
        REMOVE_RETRY_BACKOFF_MULTIPLIER,
        || std::fs::remove_dir_all(dir),
    );
    match result {
        Ok(()) => {
            debug!("Removed working directory {}", dir.display());
            true
        }
        Err(e) => {
            warn!(
                "Could not remove working directory {} after {REMOVE_RETRY_ATTEMPTS} attempts: {e}",
                dir.display()
            );
            false
        }
    }
}
