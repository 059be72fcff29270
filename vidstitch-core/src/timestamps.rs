//! Timestamp manifest generation.
//!
//! From the ordered segment list the builder accumulates start offsets and
//! writes a human-readable manifest next to the output file. The format is
//! deliberately chapter-friendly: one `HH:MM:SS.mmm` offset per segment, so
//! the lines can be pasted into a video platform's description as-is.

use std::io;
use std::path::{Path, PathBuf};

use crate::pipeline::coordinator::Segment;
use crate::utils::format_hms_millis;

/// Suffix appended to the output base name to form the manifest name.
pub const MANIFEST_SUFFIX: &str = "_timestamps.txt";

/// Manifest path for a given output path: `<output-basename>_timestamps.txt`
/// in the same directory.
#[must_use]
pub fn manifest_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "merged".to_string());
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            parent.join(format!("{stem}{MANIFEST_SUFFIX}"))
        }
        _ => PathBuf::from(format!("{stem}{MANIFEST_SUFFIX}")),
    }
}

/// Renders the manifest body from the ordered segments.
#[must_use]
pub fn build_manifest(segments: &[Segment]) -> String {
    let mut body = String::new();
    let mut elapsed = 0.0_f64;
    for (index, segment) in segments.iter().enumerate() {
        let name = segment
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| segment.source.display().to_string());
        body.push_str(&format!(
            "{} - Start of: {} (Segment {})\n",
            format_hms_millis(elapsed),
            name,
            index + 1
        ));
        elapsed += segment.duration_secs;
    }
    body.push_str(&format!("Total Duration: {}\n", format_hms_millis(elapsed)));
    body
}

/// Writes the manifest to `path`. The manifest is a side artifact; callers
/// downgrade a write failure to a warning rather than failing the job.
pub fn write_manifest(segments: &[Segment], path: &Path) -> io::Result<()> {
    std::fs::write(path, build_manifest(segments))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(name: &str, duration_secs: f64) -> Segment {
        Segment {
            path: PathBuf::from(format!("/work/norm_{name}")),
            duration_secs,
            source: PathBuf::from(format!("/videos/{name}")),
        }
    }

    #[test]
    fn manifest_path_is_alongside_output() {
        assert_eq!(
            manifest_path_for(Path::new("/out/final.mp4")),
            PathBuf::from("/out/final_timestamps.txt")
        );
        assert_eq!(
            manifest_path_for(Path::new("merged.mp4")),
            PathBuf::from("merged_timestamps.txt")
        );
    }

    #[test]
    fn offsets_accumulate_from_zero() {
        let segments = vec![
            segment("a.mp4", 12.5),
            segment("b.mp4", 3.25),
            segment("c.mp4", 60.0),
        ];
        let manifest = build_manifest(&segments);
        let lines: Vec<&str> = manifest.lines().collect();

        assert_eq!(lines[0], "00:00:00.000 - Start of: a.mp4 (Segment 1)");
        assert_eq!(lines[1], "00:00:12.500 - Start of: b.mp4 (Segment 2)");
        assert_eq!(lines[2], "00:00:15.750 - Start of: c.mp4 (Segment 3)");
        assert_eq!(lines[3], "Total Duration: 00:01:15.750");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn offsets_are_non_decreasing() {
        let segments = vec![
            segment("a.mp4", 0.0),
            segment("b.mp4", 1.0),
            segment("c.mp4", 0.0),
            segment("d.mp4", 2.0),
        ];
        let manifest = build_manifest(&segments);
        let offsets: Vec<&str> = manifest
            .lines()
            .filter(|l| l.contains("Start of"))
            .map(|l| l.split(" - ").next().unwrap())
            .collect();
        let mut sorted = offsets.clone();
        sorted.sort();
        assert_eq!(offsets, sorted);
        assert_eq!(offsets[0], "00:00:00.000");
    }

    #[test]
    fn empty_segment_list_still_totals() {
        let manifest = build_manifest(&[]);
        assert_eq!(manifest, "Total Duration: 00:00:00.000\n");
    }

    #[test]
    fn writes_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("final_timestamps.txt");
        write_manifest(&[segment("a.mp4", 5.0)], &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("00:00:00.000 - Start of: a.mp4 (Segment 1)"));
        assert!(contents.ends_with("Total Duration: 00:00:05.000\n"));
    }
}
