//! Shared data models for the SmartClip pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Clip requests and processing options
//! - Jobs and the job state machine
//! - Format tiers and entitlements
//! - The pipeline error taxonomy

pub mod entitlement;
pub mod error;
pub mod format;
pub mod job;
pub mod request;
pub mod time;

// Re-export common types
pub use entitlement::{Entitlement, PlanTier};
pub use error::{ErrorKind, FilterStage, JobError};
pub use format::FormatId;
pub use job::{ClipJob, JobId, JobState};
pub use request::{ClipOptions, ClipRequest, RequestError};
pub use time::{format_seconds, TimeRange, TimeRangeError};
