//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Orchestrator configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Scratch directory for downloads and intermediate files.
    pub work_dir: PathBuf,
    /// Maximum jobs processing at once across all destinations.
    pub max_concurrent_jobs: usize,
    /// Bounded automatic retries for source acquisition.
    pub source_retries: u32,
    /// Hard ceiling on any single external-process stage.
    pub stage_timeout: Duration,
    /// Summary service endpoint; summaries fail cleanly when unset.
    pub summary_api_url: Option<String>,
    pub summary_api_key: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("smartclip"),
            max_concurrent_jobs: 2,
            source_retries: 1,
            stage_timeout: Duration::from_secs(1800),
            summary_api_url: None,
            summary_api_key: None,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("SCLIP_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            max_concurrent_jobs: std::env::var("SCLIP_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            source_retries: std::env::var("SCLIP_SOURCE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.source_retries),
            stage_timeout: Duration::from_secs(
                std::env::var("SCLIP_STAGE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            summary_api_url: std::env::var("SCLIP_SUMMARY_API_URL").ok(),
            summary_api_key: std::env::var("SCLIP_SUMMARY_API_KEY").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.source_retries, 1);
        assert!(config.summary_api_url.is_none());
    }
}
