//! Time range handling for clip requests.
//!
//! Ranges are expressed in seconds from the start of the source video.
//! The UI clamps ranges against the known source duration before
//! submission; the orchestrator re-validates rather than clamping again.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum clip duration in seconds.
pub const MIN_CLIP_SECS: f64 = 1.0;

/// Maximum reasonable source duration (24 hours).
pub const MAX_SOURCE_SECS: f64 = 86_400.0;

/// A validated `[start, end)` window into a source video, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimeRange {
    pub start_secs: f64,
    pub end_secs: f64,
}

/// Errors from time range validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimeRangeError {
    #[error("start time cannot be negative (got {0:.3}s)")]
    NegativeStart(f64),

    #[error("end time ({end:.3}s) must be after start time ({start:.3}s)")]
    EndNotAfterStart { start: f64, end: f64 },

    #[error("clip must be at least {MIN_CLIP_SECS:.0}s long (got {0:.3}s)")]
    TooShort(f64),

    #[error("range exceeds maximum supported duration ({MAX_SOURCE_SECS:.0}s)")]
    TooLong,

    #[error("end time ({end_secs:.1}s) exceeds source duration ({source_secs:.1}s)")]
    ExceedsSource { end_secs: f64, source_secs: f64 },
}

impl TimeRange {
    /// Build a validated time range.
    pub fn new(start_secs: f64, end_secs: f64) -> Result<Self, TimeRangeError> {
        if start_secs < 0.0 || !start_secs.is_finite() {
            return Err(TimeRangeError::NegativeStart(start_secs));
        }
        if !end_secs.is_finite() || end_secs <= start_secs {
            return Err(TimeRangeError::EndNotAfterStart {
                start: start_secs,
                end: end_secs,
            });
        }
        let duration = end_secs - start_secs;
        if duration < MIN_CLIP_SECS {
            return Err(TimeRangeError::TooShort(duration));
        }
        if end_secs > MAX_SOURCE_SECS {
            return Err(TimeRangeError::TooLong);
        }
        Ok(Self {
            start_secs,
            end_secs,
        })
    }

    /// Clip duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Re-validate this range against the actual source duration.
    ///
    /// A small buffer absorbs container rounding (probed durations are not
    /// sample-exact).
    pub fn check_within(&self, source_secs: f64) -> Result<(), TimeRangeError> {
        if self.end_secs > source_secs + 1.0 {
            return Err(TimeRangeError::ExceedsSource {
                end_secs: self.end_secs,
                source_secs,
            });
        }
        Ok(())
    }

    /// Clamp to `[0, source_secs]`. Intended for callers shaping a request;
    /// the orchestrator itself rejects out-of-range input instead.
    pub fn clamp_to(&self, source_secs: f64) -> Self {
        Self {
            start_secs: self.start_secs.clamp(0.0, source_secs),
            end_secs: self.end_secs.clamp(0.0, source_secs),
        }
    }
}

/// Format seconds as `HH:MM:SS` or `HH:MM:SS.mmm`.
///
/// Used for yt-dlp section arguments and progress labels.
pub fn format_seconds(total_secs: f64) -> String {
    let hours = (total_secs / 3600.0).floor() as u32;
    let mins = ((total_secs % 3600.0) / 60.0).floor() as u32;
    let secs = total_secs % 60.0;

    if (secs - secs.floor()).abs() > 0.0001 {
        format!("{:02}:{:02}:{:06.3}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, mins, secs.floor() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_range() {
        let range = TimeRange::new(14.0, 88.0).unwrap();
        assert!((range.duration_secs() - 74.0).abs() < 0.001);
    }

    #[test]
    fn test_rejects_inverted_range() {
        assert!(matches!(
            TimeRange::new(60.0, 30.0),
            Err(TimeRangeError::EndNotAfterStart { .. })
        ));
    }

    #[test]
    fn test_rejects_sub_second_clip() {
        assert!(matches!(
            TimeRange::new(10.0, 10.5),
            Err(TimeRangeError::TooShort(_))
        ));
    }

    #[test]
    fn test_rejects_negative_start() {
        assert!(matches!(
            TimeRange::new(-1.0, 10.0),
            Err(TimeRangeError::NegativeStart(_))
        ));
    }

    #[test]
    fn test_check_within_source() {
        let range = TimeRange::new(14.0, 88.0).unwrap();
        assert!(range.check_within(100.0).is_ok());
        assert!(matches!(
            range.check_within(60.0),
            Err(TimeRangeError::ExceedsSource { .. })
        ));
        // Rounding buffer: a 87.5s source still accepts end=88
        assert!(range.check_within(87.5).is_ok());
    }

    #[test]
    fn test_clamp_to() {
        let range = TimeRange::new(14.0, 88.0).unwrap();
        let clamped = range.clamp_to(60.0);
        assert_eq!(clamped.end_secs, 60.0);
        assert_eq!(clamped.start_secs, 14.0);
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0), "00:00:00");
        assert_eq!(format_seconds(88.0), "00:01:28");
        assert_eq!(format_seconds(3661.0), "01:01:01");
        assert_eq!(format_seconds(30.5), "00:00:30.500");
    }
}
