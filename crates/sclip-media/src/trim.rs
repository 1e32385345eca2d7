//! Seek-accurate trimming and transcoding.
//!
//! The cut always uses two-pass seeking: a keyframe-rough input seek to get
//! close, then an accurate output seek for the remainder. Output duration
//! matches the request within one frame interval at the target frame rate.

use std::path::Path;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use sclip_models::FormatId;

use crate::command::{EncodeProgress, FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::SourceInfo;

/// How far ahead of the cut the fast input seek lands.
const FAST_SEEK_LEAD_SECS: f64 = 5.0;

/// Encoding parameters for the trim stage.
#[derive(Debug, Clone)]
pub struct TrimSpec {
    /// Target resolution/frame-rate tier.
    pub target: FormatId,
    /// Slower preset and lower CRF; resolution is unchanged.
    pub high_quality: bool,
}

impl TrimSpec {
    pub fn crf(&self) -> u8 {
        if self.high_quality {
            16
        } else {
            20
        }
    }

    pub fn preset(&self) -> &'static str {
        if self.high_quality {
            "slow"
        } else {
            "medium"
        }
    }
}

/// Whether the resolved stream must be re-encoded to hit the target tier.
///
/// Stream copy is a pure optimization: when the source already matches the
/// target resolution and frame rate (and no quality change is requested)
/// the cut is performed without touching the codec.
pub fn needs_reencode(source: &SourceInfo, spec: &TrimSpec) -> bool {
    if spec.high_quality {
        return true;
    }
    source.height != spec.target.height() || (source.fps - spec.target.fps() as f64).abs() > 0.5
}

/// Cut `[start, start + duration)` out of a local file.
///
/// `start_secs` is relative to the local file (the caller accounts for any
/// section-download window offset). Progress reports the encoded fraction
/// of the requested duration.
pub async fn trim_clip<F>(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start_secs: f64,
    duration_secs: f64,
    source: &SourceInfo,
    spec: &TrimSpec,
    cancel: watch::Receiver<bool>,
    timeout: Duration,
    on_progress: F,
) -> MediaResult<()>
where
    F: Fn(f64) + Send + 'static,
{
    let input = input.as_ref();
    let output = output.as_ref();

    let fast_seek = (start_secs - FAST_SEEK_LEAD_SECS).max(0.0);
    let accurate_seek = start_secs - fast_seek;
    let reencode = needs_reencode(source, spec);

    info!(
        input = %input.display(),
        output = %output.display(),
        start = start_secs,
        duration = duration_secs,
        target = %spec.target,
        reencode,
        "trimming clip"
    );

    let mut cmd = FfmpegCommand::new(input, output)
        .seek_fast(fast_seek)
        .seek_accurate(accurate_seek)
        .duration(duration_secs);

    if reencode {
        cmd = cmd
            .video_filter(format!("scale=-2:{}", spec.target.height()))
            .frame_rate(spec.target.fps())
            .video_codec("libx264")
            .preset(spec.preset())
            .crf(spec.crf())
            .audio_codec("aac")
            .audio_bitrate("128k");
    } else {
        cmd = cmd.stream_copy().normalize_timestamps();
    }
    cmd = cmd.faststart();

    let total_ms = (duration_secs * 1000.0) as i64;
    let runner = FfmpegRunner::new().with_cancel(cancel).with_timeout(timeout);
    runner
        .run_with_progress(&cmd, move |progress: EncodeProgress| {
            on_progress(progress.ratio(total_ms));
        })
        .await?;

    info!(output = %output.display(), "trim complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(height: u32, fps: f64) -> SourceInfo {
        SourceInfo {
            duration_secs: 100.0,
            width: height * 16 / 9,
            height,
            fps,
            video_codec: "h264".to_string(),
            size_bytes: 0,
        }
    }

    #[test]
    fn test_matching_source_stream_copies() {
        let spec = TrimSpec {
            target: FormatId::Hd720p30,
            high_quality: false,
        };
        assert!(!needs_reencode(&source(720, 30.0), &spec));
        // NTSC rates count as matching
        assert!(!needs_reencode(&source(720, 29.97), &spec));
    }

    #[test]
    fn test_mismatched_source_reencodes() {
        let spec = TrimSpec {
            target: FormatId::Hd720p30,
            high_quality: false,
        };
        assert!(needs_reencode(&source(1080, 30.0), &spec));
        assert!(needs_reencode(&source(720, 60.0), &spec));
    }

    #[test]
    fn test_high_quality_always_reencodes() {
        let spec = TrimSpec {
            target: FormatId::Hd720p30,
            high_quality: true,
        };
        assert!(needs_reencode(&source(720, 30.0), &spec));
    }

    #[test]
    fn test_high_quality_changes_encode_not_resolution() {
        let default = TrimSpec {
            target: FormatId::Hd720p30,
            high_quality: false,
        };
        let high = TrimSpec {
            target: FormatId::Hd720p30,
            high_quality: true,
        };
        assert!(high.crf() < default.crf());
        assert_ne!(high.preset(), default.preset());
        assert_eq!(high.target.height(), default.target.height());
    }
}
