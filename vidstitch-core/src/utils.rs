//! Utility functions for formatting and path handling.

use std::path::Path;

use crate::error::{CoreError, CoreResult};

/// Formats seconds as HH:MM:SS.mmm (e.g. 3725.5 -> "01:02:05.500").
/// Returns "??:??:??.???" for negative or non-finite inputs.
#[must_use]
pub fn format_hms_millis(seconds: f64) -> String {
    if seconds < 0.0 || !seconds.is_finite() {
        return "??:??:??.???".to_string();
    }

    let total_millis = (seconds * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02}.{millis:03}")
}

/// Safely extracts the file name from a path with consistent error handling.
pub fn get_filename_safe(path: &Path) -> CoreResult<String> {
    Ok(path
        .file_name()
        .ok_or_else(|| {
            CoreError::InvalidPath(format!("Failed to get filename for {}", path.display()))
        })?
        .to_string_lossy()
        .to_string())
}
