//! FFmpeg integration: normalization encodes and stream-copy concatenation.
//!
//! The [`Normalizer`] transcodes a non-conforming input into the target
//! profile (scale-to-fit with letterbox/pillarbox padding, forced frame rate
//! and pixel format, forced codecs). The [`Concatenator`] writes a concat
//! demuxer playlist and joins already-conforming segments without
//! re-encoding. Stream-copy is only safe because every segment was first
//! brought onto the exact same profile.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::TargetProfile;
use crate::external::{run_with_timeout, stderr_snippet, ExecError};
use crate::ledger::FailureLedger;

/// Prefix applied to normalized intermediates inside the working directory.
pub const NORMALIZED_PREFIX: &str = "norm_";

/// Name of the concat demuxer playlist, created inside the working directory.
pub const CONCAT_LIST_FILE_NAME: &str = "ffmpeg_concat_list.txt";

/// Errors raised while normalizing a single input file.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("ffmpeg binary not found: {0}")]
    ToolNotFound(String),

    #[error("normalization timed out after {0} seconds")]
    Timeout(u64),

    #[error("normalization failed for {path}: {stderr}")]
    EncodeFailed { path: String, stderr: String },

    #[error("unexpected normalization state: {0}")]
    Unexpected(String),

    #[error("IO error while normalizing: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while concatenating the normalized segments.
#[derive(Error, Debug)]
pub enum ConcatError {
    #[error("ffmpeg binary not found: {0}")]
    ToolNotFound(String),

    #[error("concatenation timed out after {0} seconds")]
    Timeout(u64),

    #[error("concatenation failed for {output}: {stderr}")]
    ConcatFailed { output: String, stderr: String },

    #[error("IO error while concatenating: {0}")]
    Io(#[from] io::Error),
}

/// Maps a probed codec name to the encoder ffmpeg should use for it.
fn encoder_name(codec: &str) -> &str {
    match codec {
        "h264" => "libx264",
        "hevc" | "h265" => "libx265",
        other => other,
    }
}

/// Formats a frame rate for the ffmpeg `-r` flag, dropping a trailing `.0`.
fn format_frame_rate(rate: f64) -> String {
    if rate.fract() == 0.0 {
        format!("{}", rate as u64)
    } else {
        format!("{rate}")
    }
}

/// Deterministic output path for a normalized intermediate: the working
/// directory, a fixed prefix, and the source's base name with an `.mp4`
/// container. Re-runs of the same job hit the same names.
#[must_use]
pub fn normalized_output_path(working_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "segment".to_string());
    working_dir.join(format!("{NORMALIZED_PREFIX}{stem}.mp4"))
}

fn build_normalize_args(
    source: &Path,
    output: &Path,
    target: &TargetProfile,
    has_audio: bool,
    preset: &str,
    crf: u8,
    audio_bitrate: &str,
) -> Vec<OsString> {
    let filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black",
        w = target.width,
        h = target.height
    );

    let mut args: Vec<OsString> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-i".into(),
        source.as_os_str().to_owned(),
        "-vf".into(),
        filter.into(),
        "-r".into(),
        format_frame_rate(target.frame_rate).into(),
        "-pix_fmt".into(),
        target.pix_fmt.clone().into(),
        "-c:v".into(),
        encoder_name(&target.video_codec).into(),
        "-preset".into(),
        preset.into(),
        "-crf".into(),
        crf.to_string().into(),
    ];

    if has_audio {
        args.extend([
            OsString::from("-c:a"),
            target.audio_codec.clone().into(),
            "-b:a".into(),
            audio_bitrate.into(),
            "-ar".into(),
            target.audio_sample_rate.to_string().into(),
            "-ac".into(),
            target.audio_channels.to_string().into(),
        ]);
    } else {
        // Sources without audio stay without audio; silence is never
        // synthesized to fill the gap.
        args.push("-an".into());
    }

    args.push(output.as_os_str().to_owned());
    args
}

/// Transcodes single input files onto the target profile.
#[derive(Debug, Clone)]
pub struct Normalizer {
    ffmpeg: PathBuf,
    timeout: Duration,
    preset: String,
    crf: u8,
    audio_bitrate: String,
}

impl Normalizer {
    pub fn new(
        ffmpeg: PathBuf,
        timeout: Duration,
        preset: String,
        crf: u8,
        audio_bitrate: String,
    ) -> Self {
        Self {
            ffmpeg,
            timeout,
            preset,
            crf,
            audio_bitrate,
        }
    }

    /// Re-encodes `source` into the target profile inside `working_dir`.
    ///
    /// On any failure the partially written output is deleted before the
    /// error is returned, so a half-encoded file is never handed downstream.
    pub fn normalize(
        &self,
        source: &Path,
        target: &TargetProfile,
        has_audio: bool,
        working_dir: &Path,
    ) -> Result<PathBuf, NormalizeError> {
        let output = normalized_output_path(working_dir, source);
        debug!(
            "Normalizing {} -> {}",
            source.display(),
            output.display()
        );

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(build_normalize_args(
            source,
            &output,
            target,
            has_audio,
            &self.preset,
            self.crf,
            &self.audio_bitrate,
        ));

        let result = run_with_timeout(&mut cmd, self.timeout);
        let out = match result {
            Ok(out) => out,
            Err(e) => {
                remove_partial(&output);
                return Err(match e {
                    ExecError::Spawn(err) if err.kind() == io::ErrorKind::NotFound => {
                        NormalizeError::ToolNotFound(self.ffmpeg.display().to_string())
                    }
                    ExecError::Spawn(err) | ExecError::Wait(err) => NormalizeError::Io(err),
                    ExecError::Timeout(secs) => NormalizeError::Timeout(secs),
                });
            }
        };

        if !out.status.success() {
            remove_partial(&output);
            return Err(NormalizeError::EncodeFailed {
                path: source.display().to_string(),
                stderr: stderr_snippet(&out.stderr),
            });
        }

        if !output.is_file() {
            return Err(NormalizeError::Unexpected(format!(
                "encoder exited successfully but produced no output at {}",
                output.display()
            )));
        }

        Ok(output)
    }
}

fn remove_partial(output: &Path) {
    if output.exists() {
        if let Err(e) = std::fs::remove_file(output) {
            warn!(
                "Could not remove partial output {}: {e}",
                output.display()
            );
        }
    }
}

/// Escapes a path for a concat demuxer playlist line. The demuxer wraps
/// paths in single quotes; an embedded quote must become `'\''`.
fn playlist_escape(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

fn write_playlist(playlist: &Path, segments: &[PathBuf]) -> io::Result<()> {
    let mut file = File::create(playlist)?;
    for segment in segments {
        // Relative paths in the list resolve against the playlist's own
        // directory, so absolutize each entry.
        let absolute = std::fs::canonicalize(segment).unwrap_or_else(|_| segment.clone());
        writeln!(file, "file '{}'", playlist_escape(&absolute))?;
    }
    file.flush()
}

fn build_concat_args(playlist: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "concat".into(),
        // Allow absolute paths and special characters in the playlist
        "-safe".into(),
        "0".into(),
        "-i".into(),
        playlist.as_os_str().to_owned(),
        "-c".into(),
        "copy".into(),
        "-movflags".into(),
        "+faststart".into(),
        "-y".into(),
        output.as_os_str().to_owned(),
    ]
}

/// Joins conforming segments into the final container without re-encoding.
#[derive(Debug, Clone)]
pub struct Concatenator {
    ffmpeg: PathBuf,
    timeout: Duration,
}

impl Concatenator {
    pub fn new(ffmpeg: PathBuf, timeout: Duration) -> Self {
        Self { ffmpeg, timeout }
    }

    /// Concatenates `segments` (already in final order) into `output`.
    ///
    /// The playlist is written inside `playlist_dir` and deleted again on
    /// every exit path. Failures are recorded to the ledger against the
    /// output path, since they are not attributable to one input file.
    pub fn concatenate(
        &self,
        segments: &[PathBuf],
        playlist_dir: &Path,
        output: &Path,
        ledger: &FailureLedger,
    ) -> Result<(), ConcatError> {
        if segments.is_empty() {
            let err = ConcatError::ConcatFailed {
                output: output.display().to_string(),
                stderr: "no segments to concatenate".to_string(),
            };
            ledger.record_path(output, &err.to_string());
            return Err(err);
        }

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let playlist = playlist_dir.join(CONCAT_LIST_FILE_NAME);
        write_playlist(&playlist, segments)?;
        info!(
            "Concatenating {} segments into {}",
            segments.len(),
            output.display()
        );

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(build_concat_args(&playlist, output));
        let result = run_with_timeout(&mut cmd, self.timeout);

        // The playlist is a scoped temporary; remove it before looking at
        // the outcome so every exit path is covered.
        if let Err(e) = std::fs::remove_file(&playlist) {
            warn!(
                "Could not remove playlist {}: {e}",
                playlist.display()
            );
        }

        let out = match result {
            Ok(out) => out,
            Err(e) => {
                let err = match e {
                    ExecError::Spawn(err) if err.kind() == io::ErrorKind::NotFound => {
                        ConcatError::ToolNotFound(self.ffmpeg.display().to_string())
                    }
                    ExecError::Spawn(err) | ExecError::Wait(err) => ConcatError::Io(err),
                    ExecError::Timeout(secs) => ConcatError::Timeout(secs),
                };
                ledger.record_path(output, &err.to_string());
                return Err(err);
            }
        };

        if !out.status.success() {
            let err = ConcatError::ConcatFailed {
                output: output.display().to_string(),
                stderr: stderr_snippet(&out.stderr),
            };
            ledger.record_path(output, &err.to_string());
            return Err(err);
        }

        let valid = output.is_file()
            && std::fs::metadata(output).map(|m| m.len() > 0).unwrap_or(false);
        if !valid {
            let err = ConcatError::ConcatFailed {
                output: output.display().to_string(),
                stderr: "merged output file is missing or empty".to_string(),
            };
            ledger.record_path(output, &err.to_string());
            return Err(err);
        }

        Ok(())
    }
}
