use thiserror::Error;

use crate::external::ffmpeg::{ConcatError, NormalizeError};
use crate::external::ffprobe::ProbeError;

/// Custom error types for vidstitch
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Input directory not found: {0}")]
    InputDirNotFound(String),

    #[error("No video files found in input directory")]
    NoFilesFound,

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Concatenation error: {0}")]
    Concat(#[from] ConcatError),

    #[error("No usable segments survived normalization")]
    NoUsableSegments,

    #[error("Merge cancelled by user")]
    Cancelled,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unexpected error: {0}")]
    Other(String),
}

/// Result type for vidstitch operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;
