//! Source acquisition via yt-dlp.
//!
//! Resolution turns an opaque video id into a playable local file at the
//! requested quality, falling back to the nearest offered quality at or
//! below the request. It never upgrades past what the caller asked for.
//!
//! This is the only stage with network I/O. Every download races against
//! the job's cancellation signal; a killed transfer leaves no orphan.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use sclip_models::{format_seconds, ClipRequest, FormatId};

use crate::deps::ExternalTool;
use crate::error::{MediaError, MediaResult};

/// Seconds of margin added around a section download, so the trim stage has
/// room for an accurate cut even when the section starts on a keyframe
/// before the requested start.
const SECTION_MARGIN_SECS: f64 = 5.0;

/// A video rendition the source offers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OfferedFormat {
    pub height: u32,
    pub fps: u32,
}

/// Remote metadata needed before any download.
#[derive(Debug, Clone)]
pub struct SourceMetadata {
    pub title: String,
    pub duration_secs: f64,
    pub offered: Vec<OfferedFormat>,
}

/// A resolved, locally playable source.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    /// Local media file containing at least the requested window.
    pub local_path: PathBuf,
    /// Quality actually obtained; at or below the request.
    pub actual_format: FormatId,
    /// Full duration of the remote source, seconds.
    pub source_duration_secs: f64,
    /// Where the local file begins in source time (non-zero for section
    /// downloads).
    pub window_start_secs: f64,
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    height: Option<u32>,
    fps: Option<f64>,
    vcodec: Option<String>,
}

/// Fetch remote metadata for a video id.
pub async fn fetch_source_metadata(
    source_id: &str,
    cancel: &watch::Receiver<bool>,
) -> MediaResult<SourceMetadata> {
    let url = watch_url(source_id);
    let output = run_ytdlp(&["--dump-json", "--no-playlist", &url], cancel).await?;

    let info: YtDlpInfo = serde_json::from_slice(&output)?;

    let offered = info
        .formats
        .iter()
        .filter(|f| f.vcodec.as_deref().map(|v| v != "none").unwrap_or(false))
        .filter_map(|f| {
            Some(OfferedFormat {
                height: f.height?,
                fps: f.fps.unwrap_or(30.0).round() as u32,
            })
        })
        .collect();

    Ok(SourceMetadata {
        title: info.title.unwrap_or_else(|| source_id.to_string()),
        duration_secs: info.duration.unwrap_or(0.0),
        offered,
    })
}

/// Pick the best ladder tier at or below the request that the source can
/// serve. Returns `None` when nothing at or below the request is offered.
pub fn select_actual_format(requested: FormatId, offered: &[OfferedFormat]) -> Option<FormatId> {
    FormatId::ladder()
        .iter()
        .copied()
        .filter(|tier| tier.fits_within(requested))
        .find(|tier| {
            offered
                .iter()
                .any(|f| f.height >= tier.height() && f.fps >= tier.fps())
        })
}

/// Resolve a request into a local media file.
///
/// Prefers a section download covering the requested window plus margin;
/// falls back to downloading the whole video when the source does not
/// support section downloads.
pub async fn resolve_source(
    request: &ClipRequest,
    metadata: &SourceMetadata,
    work_dir: &Path,
    cancel: &watch::Receiver<bool>,
) -> MediaResult<ResolvedSource> {
    let actual_format = select_actual_format(request.format_id, &metadata.offered)
        .ok_or_else(|| MediaError::NoMatchingFormat {
            requested: request.format_id.to_string(),
        })?;

    if actual_format != request.format_id {
        info!(
            requested = %request.format_id,
            actual = %actual_format,
            "requested quality not offered, substituting nearest lower tier"
        );
    }

    let url = request.watch_url();
    let local_path = work_dir.join(format!("{}.source.mp4", request.source_id));
    let selector = ytdlp_format_selector(actual_format);

    let window_start = (request.time_range.start_secs - SECTION_MARGIN_SECS).max(0.0);
    let window_end = if metadata.duration_secs > 0.0 {
        (request.time_range.end_secs + SECTION_MARGIN_SECS).min(metadata.duration_secs)
    } else {
        request.time_range.end_secs + SECTION_MARGIN_SECS
    };

    let section = format!(
        "*{}-{}",
        format_seconds(window_start),
        format_seconds(window_end)
    );

    let local_str = local_path.to_string_lossy().to_string();
    let section_args = [
        "--no-playlist",
        "--download-sections",
        section.as_str(),
        "-f",
        selector.as_str(),
        "-o",
        local_str.as_str(),
        url.as_str(),
    ];

    let window_start_secs = match run_ytdlp(&section_args, cancel).await {
        Ok(_) if local_path.exists() => window_start,
        Ok(_) => {
            warn!("section download produced no file, retrying with full download");
            download_full(&url, &selector, &local_path, cancel).await?;
            0.0
        }
        Err(MediaError::Cancelled) => return Err(MediaError::Cancelled),
        Err(e) if section_unsupported(&e) => {
            debug!("source does not support section downloads, downloading full video");
            download_full(&url, &selector, &local_path, cancel).await?;
            0.0
        }
        Err(e) => return Err(e),
    };

    let size = local_path.metadata()?.len();
    info!(
        path = %local_path.display(),
        size_mb = size as f64 / 1_048_576.0,
        format = %actual_format,
        "source resolved"
    );

    Ok(ResolvedSource {
        local_path,
        actual_format,
        source_duration_secs: metadata.duration_secs,
        window_start_secs,
        title: metadata.title.clone(),
    })
}

/// yt-dlp format selector capped at the tier's height and frame rate.
fn ytdlp_format_selector(format: FormatId) -> String {
    let h = format.height();
    let fps = format.fps();
    format!(
        "bestvideo[height<={h}][fps<={fps}][ext=mp4]+bestaudio[ext=m4a]/\
         bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/\
         best[height<={h}][ext=mp4]/best"
    )
}

async fn download_full(
    url: &str,
    selector: &str,
    local_path: &Path,
    cancel: &watch::Receiver<bool>,
) -> MediaResult<()> {
    let local_str = local_path.to_string_lossy().to_string();
    let args = [
        "--no-playlist",
        "-f",
        selector,
        "-o",
        local_str.as_str(),
        url,
    ];
    run_ytdlp(&args, cancel).await?;

    if !local_path.exists() {
        return Err(MediaError::source_unavailable("output file not created"));
    }
    Ok(())
}

/// Whether the failure means "sections not supported" rather than a dead
/// source, so a full download is worth attempting.
fn section_unsupported(err: &MediaError) -> bool {
    match err {
        MediaError::SourceUnavailable { message } => {
            message.contains("--download-sections")
                || message.contains("does not support")
                || message.contains("Unable to download section")
        }
        _ => false,
    }
}

/// Run yt-dlp, killing the transfer promptly if the job is cancelled.
async fn run_ytdlp(args: &[&str], cancel: &watch::Receiver<bool>) -> MediaResult<Vec<u8>> {
    debug!("running yt-dlp {}", args.join(" "));

    let child = Command::new("yt-dlp")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MediaError::ToolMissing(ExternalTool::YtDlp),
            _ => MediaError::Io(e),
        })?;

    let mut cancel = cancel.clone();
    let output = tokio::select! {
        output = child.wait_with_output() => output?,
        // Dropping the wait future drops the child, which kills the
        // transfer (kill_on_drop)
        _ = cancelled(&mut cancel) => return Err(MediaError::Cancelled),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp stderr: {}", stderr);
        let last_line = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("unknown error");
        return Err(MediaError::source_unavailable(format!(
            "yt-dlp failed: {}",
            last_line
        )));
    }

    Ok(output.stdout)
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn watch_url(source_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", source_id)
}
