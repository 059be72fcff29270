//! FFprobe integration for media analysis.
//!
//! Shells out to `ffprobe -v error -print_format json -show_streams
//! -show_format` and maps the JSON output into a [`StreamProfile`]. A second,
//! lighter query reads only the container duration; it is used after
//! normalization to measure actual segment length for the timestamp manifest.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::external::{run_with_timeout, stderr_snippet, ExecError};
use crate::profile::{AudioParams, StreamProfile, VideoParams};

/// Errors raised while probing a media file.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("ffprobe binary not found: {0}")]
    ToolNotFound(String),

    #[error("ffprobe timed out after {0} seconds")]
    Timeout(u64),

    #[error("ffprobe failed for {path}: {stderr}")]
    ProbeFailed { path: String, stderr: String },

    #[error("ffprobe output could not be parsed: {0}")]
    MalformedOutput(String),

    #[error("no video stream found in {0}")]
    NoVideoStream(String),

    #[error("IO error while probing: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<i64>,
    height: Option<i64>,
    avg_frame_rate: Option<String>,
    pix_fmt: Option<String>,
    sample_rate: Option<String>,
    channels: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Executes ffprobe queries against single media files.
#[derive(Debug, Clone)]
pub struct Prober {
    ffprobe: PathBuf,
    timeout: Duration,
}

impl Prober {
    /// Creates a prober around a resolved ffprobe binary.
    pub fn new(ffprobe: PathBuf, timeout: Duration) -> Self {
        Self { ffprobe, timeout }
    }

    /// Probes the primary video stream and, if present, the primary audio
    /// stream of `path`.
    ///
    /// A file without audio yields `audio: None`; a file without video is a
    /// [`ProbeError::NoVideoStream`] since a video-less container cannot be
    /// normalized to a video target.
    pub fn probe(&self, path: &Path) -> Result<StreamProfile, ProbeError> {
        debug!("Probing streams of {}", path.display());
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"])
            .arg(path);

        let parsed = self.run_and_parse(&mut cmd, path)?;

        let video_stream = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| ProbeError::NoVideoStream(path.display().to_string()))?;

        let video = VideoParams {
            codec: required_field(video_stream.codec_name.clone(), path, "codec_name")?,
            width: required_dimension(video_stream.width, path, "width")?,
            height: required_dimension(video_stream.height, path, "height")?,
            frame_rate: video_stream.avg_frame_rate.clone().unwrap_or_default(),
            pix_fmt: required_field(video_stream.pix_fmt.clone(), path, "pix_fmt")?,
        };

        let audio = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("audio"))
            .map(|stream| -> Result<AudioParams, ProbeError> {
                Ok(AudioParams {
                    codec: required_field(stream.codec_name.clone(), path, "audio codec_name")?,
                    sample_rate: stream.sample_rate.clone().unwrap_or_default(),
                    channels: stream
                        .channels
                        .filter(|&c| c >= 0)
                        .map(|c| c as u32)
                        .unwrap_or(0),
                })
            })
            .transpose()?;

        Ok(StreamProfile { video, audio })
    }

    /// Reads the container-level duration of `path` in seconds.
    pub fn duration(&self, path: &Path) -> Result<f64, ProbeError> {
        debug!("Probing duration of {}", path.display());
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_entries",
            "format=duration",
        ])
        .arg(path);

        let parsed = self.run_and_parse(&mut cmd, path)?;
        parsed
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .ok_or_else(|| {
                ProbeError::MalformedOutput(format!(
                    "missing or invalid format duration for {}",
                    path.display()
                ))
            })
    }

    fn run_and_parse(
        &self,
        cmd: &mut Command,
        path: &Path,
    ) -> Result<FfprobeOutput, ProbeError> {
        let output = run_with_timeout(cmd, self.timeout).map_err(|e| match e {
            ExecError::Spawn(err) if err.kind() == io::ErrorKind::NotFound => {
                ProbeError::ToolNotFound(self.ffprobe.display().to_string())
            }
            ExecError::Spawn(err) | ExecError::Wait(err) => ProbeError::Io(err),
            ExecError::Timeout(secs) => ProbeError::Timeout(secs),
        })?;

        if !output.status.success() {
            return Err(ProbeError::ProbeFailed {
                path: path.display().to_string(),
                stderr: stderr_snippet(&output.stderr),
            });
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ProbeError::MalformedOutput(format!("{}: {e}", path.display())))
    }
}

fn required_field(
    value: Option<String>,
    path: &Path,
    field: &str,
) -> Result<String, ProbeError> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        ProbeError::MalformedOutput(format!("missing {field} for {}", path.display()))
    })
}

fn required_dimension(value: Option<i64>, path: &Path, field: &str) -> Result<u32, ProbeError> {
    value
        .filter(|&v| v > 0)
        .map(|v| v as u32)
        .ok_or_else(|| {
            ProbeError::MalformedOutput(format!(
                "missing or invalid {field} for {}",
                path.display()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_JSON: &str = r#"{
        "streams": [
            {
                "codec_type": "video",
                "codec_name": "h264",
                "width": 1920,
                "height": 1080,
                "avg_frame_rate": "30/1",
                "pix_fmt": "yuv420p"
            },
            {
                "codec_type": "audio",
                "codec_name": "aac",
                "sample_rate": "44100",
                "channels": 2
            }
        ],
        "format": { "duration": "12.480000" }
    }"#;

    #[test]
    fn parses_full_probe_output() {
        let parsed: FfprobeOutput = serde_json::from_str(SAMPLE_JSON).unwrap();
        assert_eq!(parsed.streams.len(), 2);
        assert_eq!(parsed.streams[0].codec_name.as_deref(), Some("h264"));
        assert_eq!(parsed.streams[1].channels, Some(2));
        assert_eq!(
            parsed.format.unwrap().duration.as_deref(),
            Some("12.480000")
        );
    }

    #[test]
    fn tolerates_missing_optional_fields() {
        let json = r#"{"streams": [{"codec_type": "video"}]}"#;
        let parsed: FfprobeOutput = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.streams.len(), 1);
        assert!(parsed.streams[0].width.is_none());
        assert!(parsed.format.is_none());
    }

    #[test]
    fn required_field_rejects_empty() {
        let path = Path::new("x.mp4");
        assert!(required_field(Some("h264".into()), path, "codec").is_ok());
        assert!(required_field(Some(String::new()), path, "codec").is_err());
        assert!(required_field(None, path, "codec").is_err());
    }

    #[test]
    fn required_dimension_rejects_non_positive() {
        let path = Path::new("x.mp4");
        assert_eq!(required_dimension(Some(1920), path, "width").unwrap(), 1920);
        assert!(required_dimension(Some(0), path, "width").is_err());
        assert!(required_dimension(Some(-1), path, "width").is_err());
        assert!(required_dimension(None, path, "width").is_err());
    }
}
