//! Core library for the video normalization and concatenation pipeline,
//! built on ffmpeg and ffprobe.
//!
//! Given a directory of heterogeneous video files, this crate probes each
//! one, re-encodes those that do not already match a common target profile,
//! runs that work across a bounded worker pool, and stream-copy-concatenates
//! the surviving segments into a single container together with a per-segment
//! timestamp manifest. Per-file failures are logged to an append-only ledger
//! and dropped; the batch carries on.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use vidstitch_core::{merge_videos, MergeConfig};
//! use std::path::PathBuf;
//!
//! let config = MergeConfig::new(
//!     PathBuf::from("/path/to/videos"),
//!     PathBuf::from("/path/to/merged.mp4"),
//! );
//! let outcome = merge_videos(&config, None).unwrap();
//! println!(
//!     "merged {} segments ({} dropped)",
//!     outcome.segment_count, outcome.dropped_count
//! );
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod external;
pub mod ledger;
pub mod pipeline;
pub mod profile;
pub mod temp_files;
pub mod timestamps;
pub mod utils;

// Re-exports for public API
pub use config::{MergeConfig, MergeConfigBuilder, TargetProfile};
pub use discovery::find_video_files;
pub use error::{CoreError, CoreResult};
pub use external::ffprobe::Prober;
pub use external::resolve_tool;
pub use ledger::FailureLedger;
pub use pipeline::coordinator::{Segment, SegmentFailure};
pub use pipeline::{merge_videos, MergeOutcome};
pub use profile::{needs_normalization, AudioParams, StreamProfile, VideoParams};
pub use utils::format_hms_millis;
