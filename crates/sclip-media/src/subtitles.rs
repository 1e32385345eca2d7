//! Subtitle download, retiming, and burn-in.
//!
//! Subtitles are fetched against the full source video, so their cue
//! timestamps must be shifted left by the clip start before burning them
//! into a trimmed clip.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::deps::ExternalTool;
use crate::error::{MediaError, MediaResult};

/// Subtitle language requested from the source.
const SUB_LANG: &str = "en";

/// Download subtitles for a video id into `work_dir`, returning the `.srt`
/// path. Prefers uploaded subtitles, falls back to auto-generated captions.
pub async fn fetch_subtitles(
    source_id: &str,
    work_dir: &Path,
    cancel: &watch::Receiver<bool>,
) -> MediaResult<PathBuf> {
    let url = format!("https://www.youtube.com/watch?v={}", source_id);
    let template = work_dir.join(format!("{}.subs", source_id));
    let template_str = template.to_string_lossy().to_string();

    let args = [
        "--no-playlist",
        "--skip-download",
        "--write-subs",
        "--write-auto-subs",
        "--sub-langs",
        SUB_LANG,
        "--convert-subs",
        "srt",
        "-o",
        template_str.as_str(),
        url.as_str(),
    ];

    debug!("fetching subtitles: yt-dlp {}", args.join(" "));

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
        _ = async {
            while !*cancel.borrow() {
                if cancel.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        } => return Err(MediaError::Cancelled),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::NoSubtitles(format!(
            "{}: {}",
            source_id,
            stderr.lines().last().unwrap_or("yt-dlp failed")
        )));
    }

    // yt-dlp names the file <template>.<lang>.srt
    let srt = work_dir.join(format!("{}.subs.{}.srt", source_id, SUB_LANG));
    if !srt.exists() {
        return Err(MediaError::NoSubtitles(source_id.to_string()));
    }

    info!(path = %srt.display(), "subtitles fetched");
    Ok(srt)
}

/// Shift every cue in an SRT document left by `offset_secs`.
///
/// Cues that end before the new zero are dropped; cues straddling it are
/// clamped to start at zero.
pub fn shift_srt(content: &str, offset_secs: f64) -> String {
    let mut out = Vec::new();
    let mut index = 1u32;

    for block in content.split("\n\n") {
        let mut lines = block.lines();
        // First line may be the numeric cue index; skip it, we renumber
        let mut first = lines.next().unwrap_or_default();
        if first.trim().parse::<u32>().is_ok() {
            first = lines.next().unwrap_or_default();
        }

        let Some((start, end)) = parse_cue_timing(first) else {
            continue;
        };
        let new_end = end - offset_secs;
        if new_end <= 0.0 {
            continue;
        }
        let new_start = (start - offset_secs).max(0.0);

        let text: Vec<&str> = lines.collect();
        if text.is_empty() {
            continue;
        }

        out.push(format!(
            "{}\n{} --> {}\n{}",
            index,
            format_srt_time(new_start),
            format_srt_time(new_end),
            text.join("\n")
        ));
        index += 1;
    }

    out.join("\n\n") + "\n"
}

/// Parse an SRT timing line: `HH:MM:SS,mmm --> HH:MM:SS,mmm`.
fn parse_cue_timing(line: &str) -> Option<(f64, f64)> {
    let (start, end) = line.split_once("-->")?;
    Some((parse_srt_time(start.trim())?, parse_srt_time(end.trim())?))
}

fn parse_srt_time(s: &str) -> Option<f64> {
    let (hms, millis) = s.split_once(',').unwrap_or((s, "0"));
    let mut parts = hms.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let mins: f64 = parts.next()?.parse().ok()?;
    let secs: f64 = parts.next()?.parse().ok()?;
    let millis: f64 = millis.trim().parse().ok()?;
    Some(hours * 3600.0 + mins * 60.0 + secs + millis / 1000.0)
}

fn format_srt_time(total_secs: f64) -> String {
    let millis = ((total_secs - total_secs.floor()) * 1000.0).round() as u32;
    let total = total_secs.floor() as u64;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total / 3600,
        (total % 3600) / 60,
        total % 60,
        millis
    )
}

/// Burn an `.srt` file into the video track.
pub async fn burn_subtitles(
    input: impl AsRef<Path>,
    srt: impl AsRef<Path>,
    output: impl AsRef<Path>,
    cancel: watch::Receiver<bool>,
    timeout: Duration,
) -> MediaResult<()> {
    let srt = srt.as_ref();
    if !srt.exists() {
        return Err(MediaError::FileNotFound(srt.to_path_buf()));
    }

    let cmd = FfmpegCommand::new(input.as_ref(), output.as_ref())
        .video_filter(format!("subtitles={}", escape_filter_path(srt)))
        .video_codec("libx264")
        .preset("medium")
        .crf(20)
        .audio_codec("copy")
        .faststart();

    FfmpegRunner::new()
        .with_cancel(cancel)
        .with_timeout(timeout)
        .run(&cmd)
        .await?;

    info!(output = %output.as_ref().display(), "subtitles burned in");
    Ok(())
}

/// Escape a path for use inside an FFmpeg filter argument.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n00:00:10,000 --> 00:00:12,500\nfirst line\n\n2\n00:00:20,000 --> 00:00:22,000\nsecond line\n";

    #[test]
    fn test_shift_drops_cues_before_window() {
        let shifted = shift_srt(SAMPLE, 15.0);
        assert!(!shifted.contains("first line"));
        assert!(shifted.contains("second line"));
        assert!(shifted.contains("00:00:05,000 --> 00:00:07,000"));
        // Renumbered from 1
        assert!(shifted.starts_with("1\n"));
    }

    #[test]
    fn test_shift_clamps_straddling_cue() {
        let shifted = shift_srt(SAMPLE, 11.0);
        assert!(shifted.contains("00:00:00,000 --> 00:00:01,500"));
    }

    #[test]
    fn test_shift_zero_is_identity_modulo_numbering() {
        let shifted = shift_srt(SAMPLE, 0.0);
        assert!(shifted.contains("00:00:10,000 --> 00:00:12,500"));
        assert!(shifted.contains("00:00:20,000 --> 00:00:22,000"));
    }

    #[test]
    fn test_srt_time_roundtrip() {
        assert_eq!(format_srt_time(parse_srt_time("01:02:03,450").unwrap()), "01:02:03,450");
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
    }

    #[test]
    fn test_escape_colon_and_quote() {
        assert_eq!(
            escape_filter_path(Path::new("C:/subs/it's.srt")),
            "C\\:/subs/it\\'s.srt"
        );
    }

    #[tokio::test]
    async fn test_burn_missing_srt_fails_cleanly() {
        let (_tx, rx) = tokio::sync::watch::channel(false);
        let err = burn_subtitles(
            "/tmp/in.mp4",
            "/tmp/does-not-exist.srt",
            "/tmp/out.mp4",
            rx,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
