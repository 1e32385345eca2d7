//! Post-filter chain.
//!
//! Filters run in fixed declared order: subtitles → silence removal →
//! summary. A disabled option is a strict no-op. A failed filter does not
//! discard the job: the chain keeps the last good artifact and reports the
//! failure as a warning, because the mandatory stages already produced a
//! valid clip.

use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tracing::warn;

use sclip_media::ResolvedSource;
use sclip_models::{ClipOptions, ClipRequest, FilterStage};

use crate::error::{PipelineError, PipelineResult};
use crate::stages::MediaStages;

/// The filters a request enables, in execution order.
pub fn enabled_filters(options: &ClipOptions) -> Vec<FilterStage> {
    let mut chain = Vec::new();
    if options.subtitles {
        chain.push(FilterStage::Subtitles);
    }
    if options.remove_silence {
        chain.push(FilterStage::SilenceRemoval);
    }
    if options.summary {
        chain.push(FilterStage::Summary);
    }
    chain
}

/// Result of running the chain.
#[derive(Debug)]
pub struct ChainOutcome {
    /// Final artifact (the trim output when every filter was disabled or
    /// failed).
    pub artifact: PathBuf,
    /// Description of any failed filters; `None` on a clean run.
    pub warning: Option<String>,
}

/// Run every enabled filter over the trimmed artifact.
///
/// Only cancellation aborts the chain; individual filter failures degrade
/// to warnings.
pub async fn apply_filter_chain<S>(
    stages: &S,
    trimmed: PathBuf,
    request: &ClipRequest,
    resolved: &ResolvedSource,
    work_dir: &Path,
    cancel: &watch::Receiver<bool>,
    mut on_stage: impl FnMut(FilterStage),
) -> PipelineResult<ChainOutcome>
where
    S: MediaStages + ?Sized,
{
    let mut artifact = trimmed;
    let mut failures: Vec<String> = Vec::new();

    for stage in enabled_filters(&request.options) {
        if *cancel.borrow() {
            return Err(PipelineError::Cancelled);
        }
        on_stage(stage);

        match stages
            .apply_filter(stage, &artifact, request, resolved, work_dir, cancel.clone())
            .await
        {
            Ok(path) => artifact = path,
            Err(PipelineError::Cancelled) => return Err(PipelineError::Cancelled),
            Err(e) => {
                warn!(stage = %stage, error = %e, "optional filter failed, keeping previous artifact");
                failures.push(format!("{} filter failed: {}", stage, e));
            }
        }
    }

    let warning = if failures.is_empty() {
        None
    } else {
        Some(failures.join("; "))
    };

    Ok(ChainOutcome { artifact, warning })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sclip_models::{FormatId, TimeRange};
    use std::sync::Mutex;

    #[test]
    fn test_disabled_options_enable_nothing() {
        assert!(enabled_filters(&ClipOptions::default()).is_empty());
    }

    #[test]
    fn test_chain_order_is_fixed() {
        let options = ClipOptions {
            subtitles: true,
            summary: true,
            remove_silence: true,
            high_quality: false,
        };
        assert_eq!(
            enabled_filters(&options),
            vec![
                FilterStage::Subtitles,
                FilterStage::SilenceRemoval,
                FilterStage::Summary
            ]
        );
    }

    /// Stages stub: scripted filter outcomes, records invocations.
    struct ScriptedStages {
        fail: Vec<FilterStage>,
        cancel_on: Option<FilterStage>,
        calls: Mutex<Vec<FilterStage>>,
    }

    impl ScriptedStages {
        fn new(fail: Vec<FilterStage>) -> Self {
            Self {
                fail,
                cancel_on: None,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MediaStages for ScriptedStages {
        fn check_dependencies(&self) -> PipelineResult<()> {
            Ok(())
        }

        async fn resolve(
            &self,
            _request: &ClipRequest,
            _work_dir: &Path,
            _cancel: &watch::Receiver<bool>,
        ) -> PipelineResult<ResolvedSource> {
            unreachable!("chain tests never resolve")
        }

        async fn trim(
            &self,
            _request: &ClipRequest,
            _resolved: &ResolvedSource,
            _work_dir: &Path,
            _cancel: watch::Receiver<bool>,
            _on_progress: crate::stages::StageProgress,
        ) -> PipelineResult<PathBuf> {
            unreachable!("chain tests never trim")
        }

        async fn apply_filter(
            &self,
            stage: FilterStage,
            input: &Path,
            _request: &ClipRequest,
            _resolved: &ResolvedSource,
            work_dir: &Path,
            _cancel: watch::Receiver<bool>,
        ) -> PipelineResult<PathBuf> {
            self.calls.lock().unwrap().push(stage);
            if self.cancel_on == Some(stage) {
                return Err(PipelineError::Cancelled);
            }
            if self.fail.contains(&stage) {
                return Err(PipelineError::filter(stage, "scripted failure"));
            }
            Ok(work_dir.join(format!("after-{}.mp4", stage)))
        }
    }

    fn request(options: ClipOptions) -> ClipRequest {
        ClipRequest {
            source_id: "abc123".to_string(),
            time_range: TimeRange::new(14.0, 88.0).unwrap(),
            format_id: FormatId::Hd720p30,
            destination_dir: PathBuf::from("/tmp/clips"),
            options,
        }
    }

    fn resolved() -> ResolvedSource {
        ResolvedSource {
            local_path: PathBuf::from("/work/source.mp4"),
            actual_format: FormatId::Hd720p30,
            source_duration_secs: 100.0,
            window_start_secs: 0.0,
            title: "Test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_all_disabled_passes_trim_output_through() {
        let stages = ScriptedStages::new(vec![]);
        let (_tx, rx) = watch::channel(false);
        let outcome = apply_filter_chain(
            &stages,
            PathBuf::from("/work/trim.mp4"),
            &request(ClipOptions::default()),
            &resolved(),
            Path::new("/work"),
            &rx,
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(outcome.artifact, PathBuf::from("/work/trim.mp4"));
        assert!(outcome.warning.is_none());
        assert!(stages.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_filter_keeps_previous_artifact() {
        let stages = ScriptedStages::new(vec![FilterStage::SilenceRemoval]);
        let (_tx, rx) = watch::channel(false);
        let options = ClipOptions {
            subtitles: true,
            remove_silence: true,
            summary: false,
            high_quality: false,
        };

        let outcome = apply_filter_chain(
            &stages,
            PathBuf::from("/work/trim.mp4"),
            &request(options),
            &resolved(),
            Path::new("/work"),
            &rx,
            |_| {},
        )
        .await
        .unwrap();

        // Subtitles applied, silence removal failed: artifact is the
        // subtitle output, and the warning names the failed stage
        assert_eq!(outcome.artifact, PathBuf::from("/work/after-subtitles.mp4"));
        let warning = outcome.warning.unwrap();
        assert!(warning.contains("silence_removal"));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_chain() {
        let mut stages = ScriptedStages::new(vec![]);
        stages.cancel_on = Some(FilterStage::Subtitles);
        let (_tx, rx) = watch::channel(false);
        let options = ClipOptions {
            subtitles: true,
            remove_silence: true,
            summary: false,
            high_quality: false,
        };

        let err = apply_filter_chain(
            &stages,
            PathBuf::from("/work/trim.mp4"),
            &request(options),
            &resolved(),
            Path::new("/work"),
            &rx,
            |_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled));
        // Silence removal never ran
        assert_eq!(stages.calls.lock().unwrap().len(), 1);
    }
}
