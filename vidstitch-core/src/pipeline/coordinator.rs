//! Parallel normalization coordinator.
//!
//! Fans the per-file probe → evaluate → normalize → re-probe pipeline out
//! across a bounded worker pool. Workers are independent; the only shared
//! mutable resource is the append-only failure ledger. Completion order is
//! unconstrained, so every unit is tagged with its input index and the
//! results are reassembled into discovery order before anything downstream
//! sees them — segment order determines playback order and timestamp
//! offsets, and must not depend on scheduling.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::TargetProfile;
use crate::error::{CoreError, CoreResult};
use crate::external::ffmpeg::Normalizer;
use crate::external::ffprobe::Prober;
use crate::ledger::FailureLedger;
use crate::profile::needs_normalization;

/// One usable segment of the final output: the file to concatenate (either a
/// normalized intermediate or the untouched original), its measured duration,
/// and the source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub source: PathBuf,
}

/// Why a file was dropped from the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentFailure {
    pub source: PathBuf,
    pub reason: String,
}

/// Per-file outcome of the normalization pipeline.
pub type UnitResult = Result<Segment, SegmentFailure>;

/// Runs per-file normalization pipelines across a bounded worker pool.
pub struct Coordinator<'a> {
    pub prober: &'a Prober,
    pub normalizer: &'a Normalizer,
    pub ledger: &'a FailureLedger,
    pub target: &'a TargetProfile,
    pub working_dir: &'a Path,
    pub max_workers: usize,
    pub cancel: Option<&'a AtomicBool>,
}

impl Coordinator<'_> {
    /// Normalizes all discovered files and returns the surviving segments in
    /// discovery order.
    ///
    /// Per-file failures are recorded to the ledger and dropped; they never
    /// abort the batch. Returns `CoreError::Cancelled` if the cancel flag
    /// was raised, or `CoreError::NoUsableSegments` if nothing survived.
    pub fn run(&self, files: &[PathBuf]) -> CoreResult<Vec<Segment>> {
        let workers = effective_workers(self.max_workers, files.len());
        info!(
            "Normalizing {} files with {} workers",
            files.len(),
            workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| CoreError::Other(format!("failed to build worker pool: {e}")))?;

        let results = run_units(&pool, files, self.cancel, |path| self.process_one(path));

        if self.cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            return Err(CoreError::Cancelled);
        }

        let total = results.len();
        let segments: Vec<Segment> = results.into_iter().filter_map(Result::ok).collect();
        info!(
            "Normalization finished: {} of {} files usable",
            segments.len(),
            total
        );

        if segments.is_empty() {
            return Err(CoreError::NoUsableSegments);
        }
        Ok(segments)
    }

    /// The full pipeline for one input file. Each failure is appended to the
    /// ledger before the unit returns, so the audit trail is complete even
    /// if the caller discards the reason.
    fn process_one(&self, source: &Path) -> UnitResult {
        let profile = match self.prober.probe(source) {
            Ok(profile) => profile,
            Err(e) => return self.fail(source, format!("Probe failed: {e}")),
        };

        let path = if needs_normalization(&profile, self.target) {
            match self.normalizer.normalize(
                source,
                self.target,
                profile.audio.is_some(),
                self.working_dir,
            ) {
                Ok(path) => path,
                Err(e) => return self.fail(source, format!("Normalization failed: {e}")),
            }
        } else {
            debug!(
                "{} already matches the target profile, passing through",
                source.display()
            );
            source.to_path_buf()
        };

        let duration_secs = match self.prober.duration(&path) {
            Ok(duration) => duration,
            Err(e) => return self.fail(source, format!("Duration probe failed: {e}")),
        };

        Ok(Segment {
            path,
            duration_secs,
            source: source.to_path_buf(),
        })
    }

    fn fail(&self, source: &Path, reason: String) -> UnitResult {
        warn!("Dropping {}: {reason}", source.display());
        self.ledger.record_path(source, &reason);
        Err(SegmentFailure {
            source: source.to_path_buf(),
            reason,
        })
    }
}

/// Clamp the configured worker count to something sane for this host and
/// batch: at least one, no more than the files to process, no more than the
/// logical CPU count.
fn effective_workers(configured: usize, files: usize) -> usize {
    configured
        .max(1)
        .min(files.max(1))
        .min(num_cpus::get().max(1))
}

/// Executes `unit` for every file on the pool and reassembles the tagged
/// results into input order. Files whose unit has not started when the
/// cancel flag is raised are skipped, not executed.
fn run_units<F>(
    pool: &rayon::ThreadPool,
    files: &[PathBuf],
    cancel: Option<&AtomicBool>,
    unit: F,
) -> Vec<UnitResult>
where
    F: Fn(&Path) -> UnitResult + Sync,
{
    let mut tagged: Vec<(usize, UnitResult)> = pool.install(|| {
        files
            .par_iter()
            .enumerate()
            .map(|(index, path)| {
                if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                    debug!("Skipping {} after cancellation", path.display());
                    return (
                        index,
                        Err(SegmentFailure {
                            source: path.clone(),
                            reason: "cancelled before start".to_string(),
                        }),
                    );
                }
                (index, unit(path))
            })
            .collect()
    });

    // Completion order is scheduler-dependent; input order is the contract.
    tagged.sort_by_key(|(index, _)| *index);
    tagged.into_iter().map(|(_, result)| result).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn paths(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("clip_{i:02}.mp4"))).collect()
    }

    fn segment_for(path: &Path, duration_secs: f64) -> UnitResult {
        Ok(Segment {
            path: path.to_path_buf(),
            duration_secs,
            source: path.to_path_buf(),
        })
    }

    #[test]
    fn results_follow_input_order_not_completion_order() {
        let files = paths(8);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();

        // Later inputs finish first: sleep inversely proportional to index.
        let results = run_units(&pool, &files, None, |path| {
            let index: u64 = path
                .file_stem()
                .unwrap()
                .to_string_lossy()
                .rsplit('_')
                .next()
                .unwrap()
                .parse()
                .unwrap();
            std::thread::sleep(Duration::from_millis((8 - index) * 10));
            segment_for(path, index as f64)
        });

        let order: Vec<PathBuf> = results
            .into_iter()
            .map(|r| r.unwrap().source)
            .collect();
        assert_eq!(order, files);
    }

    #[test]
    fn one_failure_does_not_block_others() {
        let files = paths(5);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();

        let results = run_units(&pool, &files, None, |path| {
            if path.to_string_lossy().contains("02") {
                Err(SegmentFailure {
                    source: path.to_path_buf(),
                    reason: "corrupt".to_string(),
                })
            } else {
                segment_for(path, 1.0)
            }
        });

        assert_eq!(results.len(), 5);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 4);
        assert!(results[2].is_err());
    }

    #[test]
    fn cancellation_skips_unstarted_units() {
        let files = paths(64);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let cancel = AtomicBool::new(false);
        let started = AtomicUsize::new(0);

        let results = run_units(&pool, &files, Some(&cancel), |path| {
            started.fetch_add(1, Ordering::SeqCst);
            // First unit flips the flag; everything not yet started is skipped.
            cancel.store(true, Ordering::SeqCst);
            segment_for(path, 1.0)
        });

        assert_eq!(results.len(), 64);
        let executed = started.load(Ordering::SeqCst);
        assert!(executed < 64, "cancellation did not stop scheduling");
        let skipped = results
            .iter()
            .filter(|r| matches!(r, Err(f) if f.reason.contains("cancelled")))
            .count();
        assert_eq!(executed + skipped, 64);
    }

    #[test]
    fn worker_clamp() {
        assert_eq!(effective_workers(0, 10), 1);
        assert_eq!(effective_workers(5, 2), 2);
        assert!(effective_workers(512, 512) <= num_cpus::get().max(1));
    }
}
