//! Clip job record and state machine.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::JobError;
use crate::request::ClipRequest;

/// Unique identifier for a clip job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
///
/// `pending → processing → { ready | error | cancelled }`; terminal states
/// are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Admitted, waiting for entitlement/dependency checks or the
    /// destination directory to free up.
    #[default]
    Pending,
    /// A stage is actively running.
    Processing,
    /// Clip produced and placed in the destination directory.
    Ready,
    /// Failed with a classified error.
    Error,
    /// Cancelled by the caller.
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Ready => "ready",
            JobState::Error => "error",
            JobState::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further transitions or events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Ready | JobState::Error | JobState::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Orchestrator-owned execution record for one `ClipRequest`.
///
/// External callers only ever hold cloned snapshots; all mutation goes
/// through the orchestrator's job store.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClipJob {
    pub id: JobId,
    pub request: ClipRequest,
    pub state: JobState,
    /// 0-100, monotonically non-decreasing while processing.
    pub progress_percent: u8,
    /// Human-readable description of the current stage.
    pub progress_label: String,
    /// Set only when the job reached `Ready`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<PathBuf>,
    /// Set only when the job reached `Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    /// Non-fatal problem report (e.g. a failed optional filter).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClipJob {
    /// Create a freshly admitted job.
    pub fn new(request: ClipRequest) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            request,
            state: JobState::Pending,
            progress_percent: 0,
            progress_label: "Queued".to_string(),
            result_path: None,
            error: None,
            warning: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Enter the processing state.
    pub fn start(&mut self) {
        debug_assert_eq!(self.state, JobState::Pending);
        self.state = JobState::Processing;
        self.touch();
    }

    /// Update progress; percent never moves backwards.
    pub fn set_progress(&mut self, percent: u8, label: impl Into<String>) {
        self.progress_percent = percent.min(100).max(self.progress_percent);
        self.progress_label = label.into();
        self.touch();
    }

    /// Mark ready with the final artifact path.
    pub fn complete(&mut self, result_path: PathBuf) {
        self.state = JobState::Ready;
        self.progress_percent = 100;
        self.progress_label = "Ready".to_string();
        self.result_path = Some(result_path);
        self.touch();
    }

    /// Mark failed, preserving the originating error kind verbatim.
    pub fn fail(&mut self, error: JobError) {
        self.state = JobState::Error;
        self.progress_label = "Failed".to_string();
        self.error = Some(error);
        self.touch();
    }

    /// Mark cancelled.
    pub fn cancel(&mut self) {
        self.state = JobState::Cancelled;
        self.progress_label = "Cancelled".to_string();
        self.touch();
    }

    /// Attach a non-fatal warning (partial success).
    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warning = Some(warning.into());
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
