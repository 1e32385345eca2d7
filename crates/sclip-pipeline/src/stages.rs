//! Stage seam between the orchestrator and the external tools.
//!
//! The state machine in `runner` only talks to [`MediaStages`], so its
//! sequencing, cancellation, and failure semantics are testable with stub
//! stages that never spawn a process.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use sclip_media::{
    apply_silence_cuts, burn_subtitles, detect_silence, fetch_source_metadata, fetch_subtitles,
    plan_keeps, probe_media, resolve_source, shift_srt, trim_clip, FfmpegCommand, FfmpegRunner,
    MediaError, ResolvedSource, SystemProber, ToolProbe, TrimSpec,
};
use sclip_models::{ClipRequest, FilterStage};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::summary::{srt_to_text, SummaryClient};

/// Progress callback for long-running stages, `0.0..=1.0`.
pub type StageProgress = Box<dyn Fn(f64) + Send + Sync + 'static>;

/// The pipeline's view of the media layer.
#[async_trait]
pub trait MediaStages: Send + Sync {
    /// Verify the external tools are present. Must not touch the network.
    fn check_dependencies(&self) -> PipelineResult<()>;

    /// Obtain a local media file covering the requested window.
    async fn resolve(
        &self,
        request: &ClipRequest,
        work_dir: &Path,
        cancel: &watch::Receiver<bool>,
    ) -> PipelineResult<ResolvedSource>;

    /// Cut and encode the requested window out of the resolved source.
    async fn trim(
        &self,
        request: &ClipRequest,
        resolved: &ResolvedSource,
        work_dir: &Path,
        cancel: watch::Receiver<bool>,
        on_progress: StageProgress,
    ) -> PipelineResult<PathBuf>;

    /// Apply one post-filter. Returns the (possibly new) artifact path.
    async fn apply_filter(
        &self,
        stage: FilterStage,
        input: &Path,
        request: &ClipRequest,
        resolved: &ResolvedSource,
        work_dir: &Path,
        cancel: watch::Receiver<bool>,
    ) -> PipelineResult<PathBuf>;
}

/// Production implementation backed by ffmpeg/ffprobe/yt-dlp.
pub struct ToolStages {
    config: PipelineConfig,
    prober: SystemProber,
    summary: Option<SummaryClient>,
}

impl ToolStages {
    pub fn new(config: PipelineConfig) -> Self {
        let summary = SummaryClient::from_config(
            config.summary_api_url.as_deref(),
            config.summary_api_key.as_deref(),
        );
        Self {
            config,
            prober: SystemProber::default(),
            summary,
        }
    }

    /// Path of the retimed subtitle file for a request, when one exists.
    fn clip_srt_path(request: &ClipRequest, work_dir: &Path) -> PathBuf {
        work_dir.join(format!("{}.clip.srt", request.source_id))
    }
}

/// Classify a media failure inside a filter: cancellation stays
/// cancellation, everything else becomes that filter's failure.
fn filter_err(stage: FilterStage, err: MediaError) -> PipelineError {
    match err {
        MediaError::Cancelled => PipelineError::Cancelled,
        other => PipelineError::filter(stage, other.to_string()),
    }
}

#[async_trait]
impl MediaStages for ToolStages {
    fn check_dependencies(&self) -> PipelineResult<()> {
        use sclip_media::ExternalTool::{Ffmpeg, Ffprobe, YtDlp};

        if let Some(missing) = self.prober.first_missing(&[YtDlp, Ffmpeg, Ffprobe]) {
            return Err(PipelineError::DependencyMissing {
                tool: missing.command().to_string(),
                remedy: missing.remedy().to_string(),
            });
        }
        Ok(())
    }

    async fn resolve(
        &self,
        request: &ClipRequest,
        work_dir: &Path,
        cancel: &watch::Receiver<bool>,
    ) -> PipelineResult<ResolvedSource> {
        let metadata = fetch_source_metadata(&request.source_id, cancel).await?;
        let resolved = resolve_source(request, &metadata, work_dir, cancel).await?;
        Ok(resolved)
    }

    async fn trim(
        &self,
        request: &ClipRequest,
        resolved: &ResolvedSource,
        work_dir: &Path,
        cancel: watch::Receiver<bool>,
        on_progress: StageProgress,
    ) -> PipelineResult<PathBuf> {
        let info = probe_media(&resolved.local_path).await?;
        let output = work_dir.join(format!("{}.trim.mp4", request.source_id));

        let start = (request.time_range.start_secs - resolved.window_start_secs).max(0.0);
        let spec = TrimSpec {
            target: resolved.actual_format,
            high_quality: request.options.high_quality,
        };

        trim_clip(
            &resolved.local_path,
            &output,
            start,
            request.time_range.duration_secs(),
            &info,
            &spec,
            cancel,
            self.config.stage_timeout,
            move |ratio| on_progress(ratio),
        )
        .await?;

        Ok(output)
    }

    async fn apply_filter(
        &self,
        stage: FilterStage,
        input: &Path,
        request: &ClipRequest,
        resolved: &ResolvedSource,
        work_dir: &Path,
        cancel: watch::Receiver<bool>,
    ) -> PipelineResult<PathBuf> {
        match stage {
            FilterStage::Subtitles => {
                let srt = fetch_subtitles(&request.source_id, work_dir, &cancel)
                    .await
                    .map_err(|e| filter_err(stage, e))?;

                // Retime cues from source time to clip time
                let content = tokio::fs::read_to_string(&srt)
                    .await
                    .map_err(|e| PipelineError::filter(stage, e.to_string()))?;
                let shifted = shift_srt(&content, request.time_range.start_secs);
                let clip_srt = Self::clip_srt_path(request, work_dir);
                tokio::fs::write(&clip_srt, shifted)
                    .await
                    .map_err(|e| PipelineError::filter(stage, e.to_string()))?;

                let output = work_dir.join(format!("{}.subtitled.mp4", request.source_id));
                burn_subtitles(input, &clip_srt, &output, cancel, self.config.stage_timeout)
                    .await
                    .map_err(|e| filter_err(stage, e))?;
                Ok(output)
            }

            FilterStage::SilenceRemoval => {
                let info = probe_media(input)
                    .await
                    .map_err(|e| filter_err(stage, e))?;
                let spans = detect_silence(input, &cancel)
                    .await
                    .map_err(|e| filter_err(stage, e))?;

                let Some(keeps) = plan_keeps(&spans, info.duration_secs) else {
                    debug!("no worthwhile silence cut, passing clip through");
                    return Ok(input.to_path_buf());
                };

                let output = work_dir.join(format!("{}.desilenced.mp4", request.source_id));
                apply_silence_cuts(input, &output, &keeps, cancel, self.config.stage_timeout)
                    .await
                    .map_err(|e| filter_err(stage, e))?;
                Ok(output)
            }

            FilterStage::Summary => {
                let Some(client) = &self.summary else {
                    return Err(PipelineError::filter(
                        stage,
                        "summary service not configured (set SCLIP_SUMMARY_API_URL and SCLIP_SUMMARY_API_KEY)",
                    ));
                };

                // Reuse the retimed subtitles as a transcript when the
                // subtitle filter already fetched them
                let clip_srt = Self::clip_srt_path(request, work_dir);
                let transcript = match tokio::fs::read_to_string(&clip_srt).await {
                    Ok(content) => Some(srt_to_text(&content)),
                    Err(_) => None,
                };

                let summary = client
                    .summarize(
                        &resolved.title,
                        request.time_range.duration_secs(),
                        transcript.as_deref(),
                    )
                    .await
                    .map_err(|e| PipelineError::filter(stage, e.to_string()))?;

                // Embed as container metadata via a stream-copy remux
                let output = work_dir.join(format!("{}.summarized.mp4", request.source_id));
                let cmd = FfmpegCommand::new(input, &output)
                    .stream_copy()
                    .metadata("comment", &summary)
                    .faststart();
                FfmpegRunner::new()
                    .with_cancel(cancel)
                    .with_timeout(self.config.stage_timeout)
                    .run(&cmd)
                    .await
                    .map_err(|e| filter_err(stage, e))?;

                let sidecar = output.with_extension("summary.json");
                let body = serde_json::json!({
                    "title": resolved.title,
                    "summary": summary,
                    "duration_secs": request.time_range.duration_secs(),
                });
                tokio::fs::write(&sidecar, serde_json::to_vec_pretty(&body).unwrap_or_default())
                    .await
                    .map_err(|e| PipelineError::filter(stage, e.to_string()))?;

                Ok(output)
            }
        }
    }
}
