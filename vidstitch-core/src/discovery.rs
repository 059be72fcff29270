//! File discovery module for finding candidate video files to merge.
//!
//! Scans the top level of the input directory for files with a known video
//! container extension (case-insensitive) and returns them in lexicographic
//! order. Segment order in the final output follows this discovery order, so
//! the sort here is load-bearing, not cosmetic.

use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// Container extensions considered candidate inputs.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "avi", "mkv", "flv"];

/// Returns true if the path has one of the candidate video extensions.
#[must_use]
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Finds video files eligible for merging in the specified directory.
///
/// Scans only the top level; subdirectories are not searched. The returned
/// list is sorted lexicographically by path.
///
/// # Errors
///
/// * `CoreError::Io` if the directory cannot be read
/// * `CoreError::NoFilesFound` if no candidate files are present
pub fn find_video_files(input_dir: &Path) -> CoreResult<Vec<PathBuf>> {
    let read_dir = std::fs::read_dir(input_dir)?;
    let mut files: Vec<PathBuf> = read_dir
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();

            if !path.is_file() {
                return None;
            }

            is_video_file(&path).then_some(path)
        })
        .collect();

    if files.is_empty() {
        return Err(CoreError::NoFilesFound);
    }

    files.sort();
    Ok(files)
}
