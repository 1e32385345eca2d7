//! Pipeline error type and its mapping onto the job error taxonomy.

use std::path::PathBuf;
use thiserror::Error;

use sclip_media::MediaError;
use sclip_models::{ErrorKind, FilterStage, JobError};

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised while driving a job through its stages.
///
/// Each variant knows its machine-readable [`ErrorKind`]; the orchestrator
/// attaches both kind and message to the terminal state without re-wrapping
/// into anything less specific.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{reason}")]
    EntitlementDenied { reason: String },

    #[error("{0}")]
    InvalidRange(String),

    #[error("required tool missing: {tool}. {remedy}")]
    DependencyMissing { tool: String, remedy: String },

    #[error("destination not writable: {0}")]
    DestinationUnwritable(PathBuf),

    #[error("{stage} filter failed: {message}")]
    Filter {
        stage: FilterStage,
        message: String,
    },

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("job cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn entitlement_denied(reason: impl Into<String>) -> Self {
        Self::EntitlementDenied {
            reason: reason.into(),
        }
    }

    pub fn filter(stage: FilterStage, message: impl Into<String>) -> Self {
        Self::Filter {
            stage,
            message: message.into(),
        }
    }

    /// Classify into the job error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::EntitlementDenied { .. } => ErrorKind::EntitlementDenied,
            PipelineError::InvalidRange(_) => ErrorKind::InvalidRange,
            PipelineError::DependencyMissing { .. } => ErrorKind::DependencyMissing,
            PipelineError::DestinationUnwritable(_) => ErrorKind::DestinationUnwritable,
            PipelineError::Filter { stage, .. } => ErrorKind::FilterFailure(*stage),
            PipelineError::Cancelled => ErrorKind::Cancelled,
            PipelineError::Media(media) => match media {
                MediaError::ToolMissing(_) => ErrorKind::DependencyMissing,
                MediaError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
                MediaError::NoMatchingFormat { .. } => ErrorKind::FormatUnavailable,
                MediaError::Cancelled => ErrorKind::Cancelled,
                _ => ErrorKind::TranscodeFailure,
            },
            PipelineError::Io(_) => ErrorKind::TranscodeFailure,
        }
    }

    /// True when a fresh attempt may succeed (source acquisition only).
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// The classified error attached to a terminal job.
    pub fn to_job_error(&self) -> JobError {
        JobError::new(self.kind(), self.to_string())
    }
}
