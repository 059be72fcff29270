//! Probed stream parameters and target-profile compliance evaluation.
//!
//! A [`StreamProfile`] captures the technical characteristics of a file's
//! primary video stream and, when present, its primary audio stream.
//! [`needs_normalization`] compares a profile against the job's
//! [`TargetProfile`] and decides whether the file can be stream-copied as-is
//! or must be re-encoded first.

use serde::Serialize;

use crate::config::TargetProfile;

/// Maximum absolute difference between source and target frame rates that
/// still counts as compliant.
pub const FRAME_RATE_TOLERANCE: f64 = 0.001;

/// Probed parameters of the primary video stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoParams {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    /// Average frame rate as reported by the probe, usually a rational
    /// string such as `30000/1001` or `25/1`.
    pub frame_rate: String,
    pub pix_fmt: String,
}

/// Probed parameters of the primary audio stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioParams {
    pub codec: String,
    /// Sample rate as the probe reports it (a decimal string, e.g. `44100`).
    pub sample_rate: String,
    pub channels: u32,
}

/// Combined per-file probe result. `audio` is `None` for sources without an
/// audio stream; that is a valid state, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamProfile {
    pub video: VideoParams,
    pub audio: Option<AudioParams>,
}

/// Parses a frame-rate string into frames per second.
///
/// Accepts the rational `num/den` form as well as a plain decimal. Returns
/// `None` for a zero denominator or anything unparseable; callers treat that
/// as non-compliant rather than crashing.
#[must_use]
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Some((num, den)) = raw.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        let rate = num / den;
        return rate.is_finite().then_some(rate);
    }
    let rate: f64 = raw.parse().ok()?;
    rate.is_finite().then_some(rate)
}

fn video_conforms(video: &VideoParams, target: &TargetProfile) -> bool {
    if video.codec != target.video_codec
        || video.width != target.width
        || video.height != target.height
        || video.pix_fmt != target.pix_fmt
    {
        return false;
    }
    match parse_frame_rate(&video.frame_rate) {
        Some(rate) => (rate - target.frame_rate).abs() <= FRAME_RATE_TOLERANCE,
        // Unparseable rate: force normalization instead of guessing.
        None => false,
    }
}

fn audio_conforms(audio: Option<&AudioParams>, target: &TargetProfile) -> bool {
    match audio {
        // A source without audio is vacuously compliant: normalization would
        // produce an audio-less output anyway, never a synthesized track.
        None => true,
        Some(audio) => {
            audio.codec == target.audio_codec
                && audio
                    .sample_rate
                    .trim()
                    .parse::<u32>()
                    .is_ok_and(|rate| rate == target.audio_sample_rate)
                && audio.channels == target.audio_channels
        }
    }
}

/// Decides whether a file must be re-encoded to match the target profile.
///
/// Pure function, no I/O. A file conforms when its video stream matches the
/// target exactly (frame rate within [`FRAME_RATE_TOLERANCE`]) and its audio
/// stream, if any, matches the target audio parameters.
#[must_use]
pub fn needs_normalization(profile: &StreamProfile, target: &TargetProfile) -> bool {
    !(video_conforms(&profile.video, target) && audio_conforms(profile.audio.as_ref(), target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TargetProfile {
        TargetProfile::default()
    }

    fn conforming_profile() -> StreamProfile {
        StreamProfile {
            video: VideoParams {
                codec: "h264".to_string(),
                width: 1920,
                height: 1080,
                frame_rate: "30/1".to_string(),
                pix_fmt: "yuv420p".to_string(),
            },
            audio: Some(AudioParams {
                codec: "aac".to_string(),
                sample_rate: "44100".to_string(),
                channels: 2,
            }),
        }
    }

    #[test]
    fn parse_frame_rate_rational() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        let ntsc = parse_frame_rate("30000/1001").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
    }

    #[test]
    fn parse_frame_rate_plain_decimal() {
        assert_eq!(parse_frame_rate("30"), Some(30.0));
        assert_eq!(parse_frame_rate("23.976"), Some(23.976));
    }

    #[test]
    fn parse_frame_rate_rejects_zero_denominator() {
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("30/0"), None);
    }

    #[test]
    fn parse_frame_rate_rejects_garbage() {
        assert_eq!(parse_frame_rate(""), None);
        assert_eq!(parse_frame_rate("abc"), None);
        assert_eq!(parse_frame_rate("30/abc"), None);
    }

    #[test]
    fn exact_match_does_not_need_normalization() {
        assert!(!needs_normalization(&conforming_profile(), &target()));
    }

    #[test]
    fn resolution_mismatch_needs_normalization() {
        let mut profile = conforming_profile();
        profile.video.width = 640;
        profile.video.height = 480;
        assert!(needs_normalization(&profile, &target()));
    }

    #[test]
    fn codec_mismatch_needs_normalization() {
        let mut profile = conforming_profile();
        profile.video.codec = "hevc".to_string();
        assert!(needs_normalization(&profile, &target()));
    }

    #[test]
    fn frame_rate_within_tolerance_conforms() {
        let mut profile = conforming_profile();
        profile.video.frame_rate = "30.0005".to_string();
        assert!(!needs_normalization(&profile, &target()));
    }

    #[test]
    fn frame_rate_outside_tolerance_needs_normalization() {
        let mut profile = conforming_profile();
        profile.video.frame_rate = "30000/1001".to_string();
        assert!(needs_normalization(&profile, &target()));
    }

    #[test]
    fn unparseable_frame_rate_forces_normalization() {
        let mut profile = conforming_profile();
        profile.video.frame_rate = "0/0".to_string();
        assert!(needs_normalization(&profile, &target()));
    }

    #[test]
    fn missing_audio_is_vacuously_compliant() {
        let mut profile = conforming_profile();
        profile.audio = None;
        assert!(!needs_normalization(&profile, &target()));
    }

    #[test]
    fn audio_mismatch_needs_normalization() {
        let mut profile = conforming_profile();
        profile.audio.as_mut().unwrap().sample_rate = "48000".to_string();
        assert!(needs_normalization(&profile, &target()));

        let mut profile = conforming_profile();
        profile.audio.as_mut().unwrap().channels = 6;
        assert!(needs_normalization(&profile, &target()));

        let mut profile = conforming_profile();
        profile.audio.as_mut().unwrap().codec = "mp3".to_string();
        assert!(needs_normalization(&profile, &target()));
    }

    #[test]
    fn unparseable_sample_rate_forces_normalization() {
        let mut profile = conforming_profile();
        profile.audio.as_mut().unwrap().sample_rate = "not-a-rate".to_string();
        assert!(needs_normalization(&profile, &target()));
    }
}
