//! Pipeline error taxonomy.
//!
//! Every terminal `error` job carries one of these kinds alongside a
//! human-readable message, so callers can offer kind-specific remedies
//! instead of a generic failure dialog.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Post-filter chain stages, in declared execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    Subtitles,
    SilenceRemoval,
    Summary,
}

impl FilterStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterStage::Subtitles => "subtitles",
            FilterStage::SilenceRemoval => "silence_removal",
            FilterStage::Summary => "summary",
        }
    }
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Machine-readable failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "stage")]
pub enum ErrorKind {
    /// A required external tool is not installed.
    DependencyMissing,
    /// The source could not be reached or downloaded. Retryable.
    SourceUnavailable,
    /// The source offers no format at or below the requested tier.
    FormatUnavailable,
    /// The requested format or option needs a higher entitlement tier.
    EntitlementDenied,
    /// The requested range does not fit inside the source video.
    InvalidRange,
    /// FFmpeg failed while cutting or encoding.
    TranscodeFailure,
    /// A post-filter stage failed.
    FilterFailure(FilterStage),
    /// The job was cancelled by the caller.
    Cancelled,
    /// The destination directory rejected the final artifact.
    DestinationUnwritable,
}

impl ErrorKind {
    /// Only source acquisition failures are worth an automatic retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::SourceUnavailable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DependencyMissing => "dependency_missing",
            ErrorKind::SourceUnavailable => "source_unavailable",
            ErrorKind::FormatUnavailable => "format_unavailable",
            ErrorKind::EntitlementDenied => "entitlement_denied",
            ErrorKind::InvalidRange => "invalid_range",
            ErrorKind::TranscodeFailure => "transcode_failure",
            ErrorKind::FilterFailure(_) => "filter_failure",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::DestinationUnwritable => "destination_unwritable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::FilterFailure(stage) => write!(f, "filter_failure({})", stage),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Classified failure attached to a terminal job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for JobError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_source_errors_retry() {
        assert!(ErrorKind::SourceUnavailable.is_retryable());
        assert!(!ErrorKind::FormatUnavailable.is_retryable());
        assert!(!ErrorKind::TranscodeFailure.is_retryable());
        assert!(!ErrorKind::FilterFailure(FilterStage::Summary).is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn test_filter_failure_carries_stage() {
        let err = JobError::new(
            ErrorKind::FilterFailure(FilterStage::SilenceRemoval),
            "silencedetect produced no output",
        );
        assert_eq!(
            err.to_string(),
            "filter_failure(silence_removal): silencedetect produced no output"
        );
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::FilterFailure(FilterStage::Subtitles)).unwrap();
        assert!(json.contains("filter_failure"));
        assert!(json.contains("subtitles"));

        let json = serde_json::to_string(&ErrorKind::EntitlementDenied).unwrap();
        assert!(json.contains("entitlement_denied"));
    }
}
