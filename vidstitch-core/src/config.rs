//! Configuration structures and constants for the vidstitch-core library.
//!
//! This module provides the configuration system for the merge pipeline,
//! including the normalization target profile, encoder settings, worker pool
//! sizing, and per-tool timeouts.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

// Default constants

/// Default number of concurrent normalization workers.
/// Deliberately conservative: each worker shells out to an encoder process
/// that can claim a significant share of memory and CPU on its own.
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Default x264 speed/quality preset for normalization encodes.
pub const DEFAULT_X264_PRESET: &str = "medium";

/// Default CRF (Constant Rate Factor) quality value for normalization.
/// Range: 0-51, with 0 being lossless. 23 is a good general-purpose quality.
pub const DEFAULT_CRF: u8 = 23;

/// Default audio bitrate for normalized audio streams.
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Ceiling for a single ffprobe invocation.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 120;

/// Ceiling for a single normalization encode.
pub const DEFAULT_ENCODE_TIMEOUT_SECS: u64 = 3600;

/// Ceiling for the stream-copy concatenation step.
pub const DEFAULT_CONCAT_TIMEOUT_SECS: u64 = 600;

/// File name of the per-job failure ledger, created next to the output file
/// unless overridden.
pub const DEFAULT_LEDGER_FILE_NAME: &str = "merge_failures.log";

/// The normalization target: every segment handed to the stream-copy
/// concatenation must match this profile exactly, because stream-copy cannot
/// reconcile mismatched codec parameters.
///
/// `video_codec` and `audio_codec` are codec names as ffprobe reports them
/// (`h264`, `aac`), not encoder names.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetProfile {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub pix_fmt: String,
    pub video_codec: String,
    pub audio_codec: String,
    pub audio_sample_rate: u32,
    pub audio_channels: u32,
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            frame_rate: 30.0,
            pix_fmt: "yuv420p".to_string(),
            video_codec: "h264".to_string(),
            audio_codec: "aac".to_string(),
            audio_sample_rate: 44100,
            audio_channels: 2,
        }
    }
}

/// Main configuration structure for the vidstitch-core library.
///
/// Holds all parameters required for one merge job: input/output paths, the
/// normalization target, encoder settings, worker pool size, and timeouts.
/// Typically created by the consumer (e.g. vidstitch-cli) and passed to
/// [`crate::pipeline::merge_videos`].
///
/// Only `input_dir` and `output_path` are required; everything else has a
/// sensible default. The builder provides a convenient way to override
/// individual settings.
///
/// # Examples
///
/// ```rust,no_run
/// use vidstitch_core::config::MergeConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = MergeConfigBuilder::new()
///     .input_dir(PathBuf::from("/path/to/videos"))
///     .output_path(PathBuf::from("/path/to/merged.mp4"))
///     .max_workers(3)
///     .crf(21)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Directory containing the input video files to merge
    pub input_dir: PathBuf,

    /// Path of the final concatenated output container
    pub output_path: PathBuf,

    /// Optional working directory for normalized intermediates
    /// (defaults to a job-derived directory next to the output)
    pub working_dir: Option<PathBuf>,

    /// Optional path for the failure ledger
    /// (defaults to `merge_failures.log` next to the output)
    pub ledger_path: Option<PathBuf>,

    /// Optional explicit path to the ffmpeg binary (defaults to PATH lookup)
    pub ffmpeg_path: Option<PathBuf>,

    /// Optional explicit path to the ffprobe binary (defaults to PATH lookup)
    pub ffprobe_path: Option<PathBuf>,

    /// Number of concurrent normalization workers
    pub max_workers: usize,

    /// x264 preset used when a file must be re-encoded
    pub x264_preset: String,

    /// CRF quality used when a file must be re-encoded (0-51, lower is better)
    pub crf: u8,

    /// Audio bitrate used when a file must be re-encoded
    pub audio_bitrate: String,

    /// Ceiling for a single ffprobe invocation
    pub probe_timeout: Duration,

    /// Ceiling for a single normalization encode
    pub encode_timeout: Duration,

    /// Ceiling for the stream-copy concatenation
    pub concat_timeout: Duration,

    /// The profile every segment must match before concatenation
    pub target: TargetProfile,
}

impl MergeConfig {
    /// Creates a configuration with defaults for everything except the two
    /// required paths.
    pub fn new(input_dir: PathBuf, output_path: PathBuf) -> Self {
        Self {
            input_dir,
            output_path,
            working_dir: None,
            ledger_path: None,
            ffmpeg_path: None,
            ffprobe_path: None,
            max_workers: DEFAULT_MAX_WORKERS,
            x264_preset: DEFAULT_X264_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            encode_timeout: Duration::from_secs(DEFAULT_ENCODE_TIMEOUT_SECS),
            concat_timeout: Duration::from_secs(DEFAULT_CONCAT_TIMEOUT_SECS),
            target: TargetProfile::default(),
        }
    }

    /// Validates the configuration, returning `CoreError::Config` on the
    /// first problem found.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_workers == 0 {
            return Err(CoreError::Config(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.crf > 51 {
            return Err(CoreError::Config(format!(
                "crf must be in 0-51, got {}",
                self.crf
            )));
        }
        if self.x264_preset.is_empty() {
            return Err(CoreError::Config("x264_preset must not be empty".to_string()));
        }
        if self.output_path.file_name().is_none() {
            return Err(CoreError::Config(format!(
                "output path '{}' has no file name",
                self.output_path.display()
            )));
        }
        if self.target.width == 0 || self.target.height == 0 {
            return Err(CoreError::Config("target dimensions must be non-zero".to_string()));
        }
        // yuv420p subsampling requires even dimensions
        if self.target.width % 2 != 0 || self.target.height % 2 != 0 {
            return Err(CoreError::Config(format!(
                "target dimensions must be even, got {}x{}",
                self.target.width, self.target.height
            )));
        }
        if !(self.target.frame_rate.is_finite() && self.target.frame_rate > 0.0) {
            return Err(CoreError::Config(format!(
                "target frame rate must be positive, got {}",
                self.target.frame_rate
            )));
        }
        Ok(())
    }

    /// Directory that holds normalized intermediates and the concat playlist
    /// for this job. Deterministic per output path so a crashed run's stale
    /// directory can be found and removed on the next run.
    pub fn effective_working_dir(&self) -> PathBuf {
        if let Some(dir) = &self.working_dir {
            return dir.clone();
        }
        let stem = self
            .output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "merge".to_string());
        self.output_parent().join(format!(".{stem}_work"))
    }

    /// Path of the failure ledger for this job.
    pub fn effective_ledger_path(&self) -> PathBuf {
        match &self.ledger_path {
            Some(path) => path.clone(),
            None => self.output_parent().join(DEFAULT_LEDGER_FILE_NAME),
        }
    }

    fn output_parent(&self) -> PathBuf {
        match self.output_path.parent() {
            Some(parent) if parent.as_os_str().is_empty() => PathBuf::from("."),
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        }
    }
}

/// Fluent builder for [`MergeConfig`].
#[derive(Debug, Default)]
pub struct MergeConfigBuilder {
    input_dir: Option<PathBuf>,
    output_path: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    ledger_path: Option<PathBuf>,
    ffmpeg_path: Option<PathBuf>,
    ffprobe_path: Option<PathBuf>,
    max_workers: Option<usize>,
    x264_preset: Option<String>,
    crf: Option<u8>,
    audio_bitrate: Option<String>,
    probe_timeout: Option<Duration>,
    encode_timeout: Option<Duration>,
    concat_timeout: Option<Duration>,
    target: Option<TargetProfile>,
}

impl MergeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_dir(mut self, dir: PathBuf) -> Self {
        self.input_dir = Some(dir);
        self
    }

    pub fn output_path(mut self, path: PathBuf) -> Self {
        self.output_path = Some(path);
        self
    }

    pub fn working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn ledger_path(mut self, path: PathBuf) -> Self {
        self.ledger_path = Some(path);
        self
    }

    pub fn ffmpeg_path(mut self, path: PathBuf) -> Self {
        self.ffmpeg_path = Some(path);
        self
    }

    pub fn ffprobe_path(mut self, path: PathBuf) -> Self {
        self.ffprobe_path = Some(path);
        self
    }

    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    pub fn x264_preset(mut self, preset: impl Into<String>) -> Self {
        self.x264_preset = Some(preset.into());
        self
    }

    pub fn crf(mut self, crf: u8) -> Self {
        self.crf = Some(crf);
        self
    }

    pub fn audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.audio_bitrate = Some(bitrate.into());
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    pub fn encode_timeout(mut self, timeout: Duration) -> Self {
        self.encode_timeout = Some(timeout);
        self
    }

    pub fn concat_timeout(mut self, timeout: Duration) -> Self {
        self.concat_timeout = Some(timeout);
        self
    }

    pub fn target(mut self, target: TargetProfile) -> Self {
        self.target = Some(target);
        self
    }

    /// Builds the configuration. Unset required paths default to `.` and
    /// `merged.mp4`; call [`MergeConfig::validate`] before running a job.
    pub fn build(self) -> MergeConfig {
        let mut config = MergeConfig::new(
            self.input_dir.unwrap_or_else(|| PathBuf::from(".")),
            self.output_path.unwrap_or_else(|| PathBuf::from("merged.mp4")),
        );
        config.working_dir = self.working_dir;
        config.ledger_path = self.ledger_path;
        config.ffmpeg_path = self.ffmpeg_path;
        config.ffprobe_path = self.ffprobe_path;
        if let Some(workers) = self.max_workers {
            config.max_workers = workers;
        }
        if let Some(preset) = self.x264_preset {
            config.x264_preset = preset;
        }
        if let Some(crf) = self.crf {
            config.crf = crf;
        }
        if let Some(bitrate) = self.audio_bitrate {
            config.audio_bitrate = bitrate;
        }
        if let Some(timeout) = self.probe_timeout {
            config.probe_timeout = timeout;
        }
        if let Some(timeout) = self.encode_timeout {
            config.encode_timeout = timeout;
        }
        if let Some(timeout) = self.concat_timeout {
            config.concat_timeout = timeout;
        }
        if let Some(target) = self.target {
            config.target = target;
        }
        config
    }
}
