//! Clip request types.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::FormatId;
use crate::time::{TimeRange, TimeRangeError};

/// Independent post-processing toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClipOptions {
    /// Burn subtitles into the video.
    #[serde(default)]
    pub subtitles: bool,
    /// Generate AI summary metadata (Pro).
    #[serde(default)]
    pub summary: bool,
    /// Cut silent passages out of the clip.
    #[serde(default)]
    pub remove_silence: bool,
    /// Higher bitrate / slower encode preset. Does not change resolution.
    #[serde(default)]
    pub high_quality: bool,
}

impl ClipOptions {
    /// True when no post-filter is requested.
    pub fn all_disabled(&self) -> bool {
        !self.subtitles && !self.summary && !self.remove_silence
    }
}

/// Immutable description of the clip to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClipRequest {
    /// Opaque video identifier (YouTube video id).
    pub source_id: String,
    /// Window into the source, seconds.
    pub time_range: TimeRange,
    /// Requested resolution/frame-rate tier.
    pub format_id: FormatId,
    /// Directory the finished clip is placed in.
    pub destination_dir: PathBuf,
    /// Post-processing toggles.
    #[serde(default)]
    pub options: ClipOptions,
}

/// Errors rejected synchronously at submission.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("source id cannot be empty")]
    EmptySourceId,

    #[error(transparent)]
    InvalidTimeRange(#[from] TimeRangeError),

    #[error("destination is not a writable directory: {0}")]
    DestinationUnwritable(PathBuf),
}

impl ClipRequest {
    /// Canonical watch URL for the source id.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.source_id)
    }

    /// Structural validation that needs no network or probe.
    ///
    /// Range-vs-source validation happens later, once the resolver has
    /// reported the true source duration.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.source_id.trim().is_empty() {
            return Err(RequestError::EmptySourceId);
        }
        // Re-run the TimeRange invariants; a deserialized request may have
        // bypassed the constructor.
        TimeRange::new(self.time_range.start_secs, self.time_range.end_secs)?;
        Ok(())
    }
}
