//! Append-only failure ledger.
//!
//! Every component that drops a file or fails a job appends one line here so
//! an operator can audit exactly what was excluded from a merge and why. The
//! ledger is truncated at job start; it always reflects a single run.

use std::fmt::Display;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::warn;

use crate::error::CoreResult;

/// Per-job failure log with atomic line appends.
///
/// Workers on the normalization pool write concurrently; the mutex-held file
/// handle plus one `write_all` per record keeps lines from interleaving.
/// `record` never raises: a ledger write failure must not take down the
/// pipeline it is auditing.
#[derive(Debug)]
pub struct FailureLedger {
    path: PathBuf,
    file: Mutex<File>,
}

impl FailureLedger {
    /// Creates (truncating) the ledger file for a new job.
    pub fn create(path: &Path) -> CoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Appends one failure record: `<subject> | Reason: <reason>`.
    pub fn record(&self, subject: impl Display, reason: &str) {
        let line = format!("{subject} | Reason: {reason}\n");
        match self.file.lock() {
            Ok(mut file) => {
                if let Err(e) = file.write_all(line.as_bytes()).and_then(|()| file.flush()) {
                    warn!("Failed to write failure ledger entry: {e}");
                }
            }
            Err(_) => warn!("Failure ledger lock poisoned; entry dropped: {}", line.trim_end()),
        }
    }

    /// Convenience for path subjects.
    pub fn record_path(&self, subject: &Path, reason: &str) {
        self.record(subject.display(), reason);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn create_truncates_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge_failures.log");
        std::fs::write(&path, "stale entry from last run\n").unwrap();

        let ledger = FailureLedger::create(&path).unwrap();
        ledger.record_path(Path::new("/videos/bad.mp4"), "Probe failed: no video stream");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("stale entry"));
        assert_eq!(
            contents,
            "/videos/bad.mp4 | Reason: Probe failed: no video stream\n"
        );
    }

    #[test]
    fn create_makes_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/merge_failures.log");
        let ledger = FailureLedger::create(&path).unwrap();
        ledger.record("job", "nothing to do");
        assert!(path.is_file());
    }

    #[test]
    fn concurrent_records_keep_whole_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge_failures.log");
        let ledger = Arc::new(FailureLedger::create(&path).unwrap());

        let mut handles = Vec::new();
        for worker in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || {
                for i in 0..25 {
                    ledger.record(format!("worker{worker}-file{i}.mp4"), "encode failed");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 8 * 25);
        for line in lines {
            assert!(line.ends_with(" | Reason: encode failed"), "broken line: {line}");
        }
    }
}
