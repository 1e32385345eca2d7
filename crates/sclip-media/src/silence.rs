//! Silence detection and removal.
//!
//! Detection runs the FFmpeg `silencedetect` audio filter and parses its
//! stderr report. The cut is applied by extracting the kept segments with
//! accurate seeks and joining them with the concat demuxer, so only the
//! segment boundaries are re-encoded work; the join itself is a stream copy.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::deps::ExternalTool;
use crate::error::{MediaError, MediaResult};

/// Noise floor treated as silence.
const SILENCE_NOISE_DB: &str = "-35dB";

/// Minimum silent span worth cutting, seconds.
const MIN_SILENCE_SECS: f64 = 1.0;

/// Padding kept around speech on both sides of a cut, seconds.
const KEEP_PADDING_SECS: f64 = 0.2;

/// Skip the whole pass when it would remove less than this fraction.
const MIN_CUT_RATIO: f64 = 0.05;

/// Refuse to cut when less than this fraction would remain.
const MIN_KEEP_RATIO: f64 = 0.10;

/// Kept segments shorter than this are dropped as padding artifacts.
const MIN_SEGMENT_SECS: f64 = 0.3;

/// A detected silent span in the input, seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceSpan {
    pub start_secs: f64,
    pub end_secs: f64,
}

/// A span of the input to keep in the output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeepSegment {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl KeepSegment {
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Detect silent spans in a local media file.
pub async fn detect_silence(
    input: impl AsRef<Path>,
    cancel: &watch::Receiver<bool>,
) -> MediaResult<Vec<SilenceSpan>> {
    let input = input.as_ref();

    let filter = format!(
        "silencedetect=noise={}:d={}",
        SILENCE_NOISE_DB, MIN_SILENCE_SECS
    );

    let child = Command::new("ffmpeg")
        .args([
            "-hide_banner",
            "-i",
            &input.to_string_lossy(),
            "-af",
            &filter,
            "-f",
            "null",
            "-",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MediaError::ToolMissing(ExternalTool::Ffmpeg),
            _ => MediaError::Io(e),
        })?;

    let mut cancel = cancel.clone();
    let output = tokio::select! {
        output = child.wait_with_output() => output?,
        _ = async {
            while !*cancel.borrow() {
                if cancel.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        } => return Err(MediaError::Cancelled),
    };

    if !output.status.success() {
        return Err(MediaError::ffmpeg_failed(
            "silencedetect pass failed",
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
            output.status.code(),
        ));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Ok(parse_silencedetect(&stderr))
}

/// Parse `silence_start` / `silence_end` report lines from FFmpeg stderr.
fn parse_silencedetect(stderr: &str) -> Vec<SilenceSpan> {
    let mut spans = Vec::new();
    let mut open_start: Option<f64> = None;

    for line in stderr.lines() {
        if let Some(value) = field_after(line, "silence_start:") {
            open_start = value.parse().ok();
        } else if let Some(value) = field_after(line, "silence_end:") {
            if let (Some(start), Ok(end)) = (open_start.take(), value.parse::<f64>()) {
                if end > start {
                    spans.push(SilenceSpan {
                        start_secs: start,
                        end_secs: end,
                    });
                }
            }
        }
    }

    spans
}

fn field_after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let idx = line.find(marker)? + marker.len();
    Some(line[idx..].split_whitespace().next().unwrap_or(""))
}

/// Build the keep plan from detected silences.
///
/// Returns `None` when the cut is not worth applying: nothing detected, the
/// removal is negligible, or so much would go that the clip loses its
/// content.
pub fn plan_keeps(spans: &[SilenceSpan], total_secs: f64) -> Option<Vec<KeepSegment>> {
    if spans.is_empty() || total_secs <= 0.0 {
        return None;
    }

    let mut keeps = Vec::new();
    let mut cursor = 0.0;

    for span in spans {
        // Padding shrinks the cut from both sides, keeping speech onsets
        let cut_start = (span.start_secs + KEEP_PADDING_SECS).max(cursor);
        let cut_end = (span.end_secs - KEEP_PADDING_SECS).min(total_secs);
        if cut_end <= cut_start {
            continue;
        }
        if cut_start > cursor {
            keeps.push(KeepSegment {
                start_secs: cursor,
                end_secs: cut_start,
            });
        }
        cursor = cut_end;
    }
    if cursor < total_secs {
        keeps.push(KeepSegment {
            start_secs: cursor,
            end_secs: total_secs,
        });
    }

    keeps.retain(|k| k.duration_secs() >= MIN_SEGMENT_SECS);
    if keeps.is_empty() {
        return None;
    }

    let kept: f64 = keeps.iter().map(|k| k.duration_secs()).sum();
    let keep_ratio = kept / total_secs;

    if 1.0 - keep_ratio < MIN_CUT_RATIO {
        debug!(
            keep_ratio = format!("{:.1}%", keep_ratio * 100.0),
            "cut too small, skipping silence removal"
        );
        return None;
    }
    if keep_ratio < MIN_KEEP_RATIO {
        warn!(
            keep_ratio = format!("{:.1}%", keep_ratio * 100.0),
            "cut would remove nearly everything, skipping silence removal"
        );
        return None;
    }

    Some(keeps)
}

/// Apply the keep plan: extract each segment, then concat with stream copy.
pub async fn apply_silence_cuts(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    keeps: &[KeepSegment],
    cancel: watch::Receiver<bool>,
    timeout: Duration,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    if keeps.is_empty() {
        return Err(MediaError::InvalidMedia(
            "silence plan kept no segments".to_string(),
        ));
    }

    let temp_dir = tempfile::tempdir()?;
    let mut segment_paths = Vec::new();

    for (i, keep) in keeps.iter().enumerate() {
        let seg_path = temp_dir.path().join(format!("seg_{:04}.mp4", i));

        // Accurate cuts need a re-encode; stream copy would snap to
        // keyframes and duplicate frames at the joins
        let cmd = FfmpegCommand::new(input, &seg_path)
            .seek_accurate(keep.start_secs)
            .duration(keep.duration_secs())
            .video_codec("libx264")
            .preset("veryfast")
            .crf(20)
            .audio_codec("aac")
            .audio_bitrate("128k")
            .normalize_timestamps();

        FfmpegRunner::new()
            .with_cancel(cancel.clone())
            .with_timeout(timeout)
            .run(&cmd)
            .await?;

        segment_paths.push(seg_path);
    }

    let concat_list = temp_dir.path().join("concat.txt");
    let list_content: String = segment_paths
        .iter()
        .map(|p| format!("file '{}'\n", p.display()))
        .collect();
    tokio::fs::write(&concat_list, &list_content).await?;

    let concat_output = Command::new("ffmpeg")
        .args([
            "-y",
            "-hide_banner",
            "-v",
            "error",
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
            &concat_list.to_string_lossy(),
            "-c",
            "copy",
            "-movflags",
            "+faststart",
            &output.to_string_lossy(),
        ])
        .stdin(Stdio::null())
        .output()
        .await?;

    if !concat_output.status.success() {
        return Err(MediaError::ffmpeg_failed(
            "concat of kept segments failed",
            Some(String::from_utf8_lossy(&concat_output.stderr).to_string()),
            concat_output.status.code(),
        ));
    }

    info!(
        segments = keeps.len(),
        output = %output.display(),
        "silence removal applied"
    );
    Ok(())
}
