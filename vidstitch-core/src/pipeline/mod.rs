//! Top-level merge orchestration.
//!
//! Wires the pipeline together for one job: discovery, ledger setup, working
//! directory preparation, parallel normalization, timestamp manifest,
//! stream-copy concatenation, and cleanup. Per-file failures are tolerated
//! and logged; job-level failures (no inputs, nothing usable, concatenation
//! error) propagate to the caller.

pub mod coordinator;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use log::{info, warn};

use crate::config::MergeConfig;
use crate::error::{CoreError, CoreResult};
use crate::external::ffmpeg::{Concatenator, Normalizer};
use crate::external::ffprobe::Prober;
use crate::external::resolve_tool;
use crate::ledger::FailureLedger;
use crate::pipeline::coordinator::Coordinator;
use crate::{discovery, temp_files, timestamps};

/// Result of a successful merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The final concatenated container.
    pub output_path: PathBuf,
    /// The timestamp manifest, if it could be written.
    pub manifest_path: Option<PathBuf>,
    /// Path of the failure ledger for this run.
    pub ledger_path: PathBuf,
    /// Segments present in the output.
    pub segment_count: usize,
    /// Inputs dropped after probe/normalization failures.
    pub dropped_count: usize,
    /// Sum of the measured segment durations, in seconds.
    pub total_duration_secs: f64,
}

/// Merges every video file in `config.input_dir` into `config.output_path`.
///
/// The single entry point of the core. On success the output container and
/// (best-effort) the timestamp manifest exist; on failure no usable output
/// was produced and the failure ledger holds the audit trail. `cancel` may
/// be flipped from another thread (e.g. a signal handler) to stop scheduling
/// further work.
pub fn merge_videos(
    config: &MergeConfig,
    cancel: Option<&AtomicBool>,
) -> CoreResult<MergeOutcome> {
    config.validate()?;

    if !config.input_dir.is_dir() {
        return Err(CoreError::InputDirNotFound(
            config.input_dir.display().to_string(),
        ));
    }

    let files = discovery::find_video_files(&config.input_dir)?;
    info!(
        "Discovered {} video files in {}",
        files.len(),
        config.input_dir.display()
    );

    let ffprobe = resolve_tool("ffprobe", config.ffprobe_path.as_deref())?;
    let ffmpeg = resolve_tool("ffmpeg", config.ffmpeg_path.as_deref())?;

    let ledger = FailureLedger::create(&config.effective_ledger_path())?;
    let working_dir = config.effective_working_dir();
    temp_files::ensure_clean_dir(&working_dir)?;

    // The working directory is removed exactly once, whatever happens in the
    // pipeline body.
    let result = run_pipeline(config, cancel, &ffprobe, &ffmpeg, &ledger, &working_dir, &files);
    temp_files::remove_dir_with_retry(&working_dir);
    result
}

fn run_pipeline(
    config: &MergeConfig,
    cancel: Option<&AtomicBool>,
    ffprobe: &Path,
    ffmpeg: &Path,
    ledger: &FailureLedger,
    working_dir: &Path,
    files: &[PathBuf],
) -> CoreResult<MergeOutcome> {
    let prober = Prober::new(ffprobe.to_path_buf(), config.probe_timeout);
    let normalizer = Normalizer::new(
        ffmpeg.to_path_buf(),
        config.encode_timeout,
        config.x264_preset.clone(),
        config.crf,
        config.audio_bitrate.clone(),
    );

    let coordinator = Coordinator {
        prober: &prober,
        normalizer: &normalizer,
        ledger,
        target: &config.target,
        working_dir,
        max_workers: config.max_workers,
        cancel,
    };
    let segments = coordinator.run(files)?;
    let dropped_count = files.len() - segments.len();

    let manifest_path = timestamps::manifest_path_for(&config.output_path);
    let manifest_path = match timestamps::write_manifest(&segments, &manifest_path) {
        Ok(()) => Some(manifest_path),
        Err(e) => {
            // Side artifact; the merge itself can still proceed.
            warn!(
                "Could not write timestamp manifest {}: {e}",
                manifest_path.display()
            );
            None
        }
    };

    let segment_paths: Vec<PathBuf> = segments.iter().map(|s| s.path.clone()).collect();
    let concatenator = Concatenator::new(ffmpeg.to_path_buf(), config.concat_timeout);
    concatenator.concatenate(&segment_paths, working_dir, &config.output_path, ledger)?;

    let total_duration_secs = segments.iter().map(|s| s.duration_secs).sum();
    info!(
        "Merged {} segments ({} dropped) into {}",
        segments.len(),
        dropped_count,
        config.output_path.display()
    );

    Ok(MergeOutcome {
        output_path: config.output_path.clone(),
        manifest_path,
        ledger_path: ledger.path().to_path_buf(),
        segment_count: segments.len(),
        dropped_count,
        total_duration_secs,
    })
}
