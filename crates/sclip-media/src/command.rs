//! FFmpeg command building and execution.
//!
//! The runner parses `-progress pipe:2` output and races process completion
//! against a cancellation signal, so a cancelled job never waits for FFmpeg
//! to finish on its own.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Builder for a single FFmpeg invocation.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    /// Arguments placed before `-i` (input options, fast seek).
    input_args: Vec<String>,
    /// Arguments placed after `-i` (output options, accurate seek).
    output_args: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
        }
    }

    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Keyframe-rough seek before the demuxer opens the input.
    pub fn seek_fast(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Frame-accurate seek applied after decoding starts.
    pub fn seek_accurate(self, seconds: f64) -> Self {
        self.output_arg("-ss").output_arg(format!("{:.3}", seconds))
    }

    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Copy all streams without re-encoding.
    pub fn stream_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    pub fn frame_rate(self, fps: u32) -> Self {
        self.output_arg("-r").output_arg(fps.to_string())
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn audio_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-af").output_arg(filter)
    }

    /// Attach a container metadata entry.
    pub fn metadata(self, key: &str, value: &str) -> Self {
        self.output_arg("-metadata")
            .output_arg(format!("{}={}", key, value))
    }

    /// Shift timestamps so cuts start at zero.
    pub fn normalize_timestamps(self) -> Self {
        self.output_arg("-avoid_negative_ts").output_arg("make_zero")
    }

    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Final argument vector.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ];
        args.extend(self.input_args.clone());
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());
        args.extend(self.output_args.clone());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Incremental progress parsed from FFmpeg's `-progress` stream.
#[derive(Debug, Clone, Default)]
pub struct EncodeProgress {
    pub frame: u64,
    pub fps: f64,
    /// Output timestamp reached so far, milliseconds.
    pub out_time_ms: i64,
    /// Encode speed relative to realtime.
    pub speed: f64,
    pub is_complete: bool,
}

impl EncodeProgress {
    /// Completion ratio in `[0, 1]` given the expected output duration.
    pub fn ratio(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        (self.out_time_ms as f64 / total_duration_ms as f64).clamp(0.0, 1.0)
    }
}

/// Executes FFmpeg commands with progress reporting and prompt cancellation.
pub struct FfmpegRunner {
    cancel: Option<watch::Receiver<bool>>,
    timeout: Option<Duration>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self {
            cancel: None,
            timeout: None,
        }
    }

    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run a command, discarding progress.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run a command, invoking `on_progress` for every progress block FFmpeg
    /// emits. Progress timestamps are non-decreasing.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, on_progress: F) -> MediaResult<()>
    where
        F: Fn(EncodeProgress) + Send + 'static,
    {
        let args = cmd.build_args();
        debug!("running ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    MediaError::ToolMissing(crate::deps::ExternalTool::Ffmpeg)
                }
                _ => MediaError::Io(e),
            })?;

        let stderr = child.stderr.take().expect("stderr was piped");
        let reader_handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut current = EncodeProgress::default();
            let mut tail: Vec<String> = Vec::new();

            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(snapshot) = parse_progress_line(&line, &mut current) {
                    on_progress(snapshot);
                } else if !line.contains('=') {
                    // Non-progress stderr output is diagnostic text
                    tail.push(line);
                    if tail.len() > 20 {
                        tail.remove(0);
                    }
                }
            }
            tail.join("\n")
        });

        let status = self.wait(&mut child).await;
        let stderr_tail = reader_handle.await.unwrap_or_default();

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr_tail),
                status.code(),
            )),
            Err(e) => Err(e),
        }
    }

    /// Wait for the child, killing it promptly on cancel or timeout.
    async fn wait(&self, child: &mut tokio::process::Child) -> MediaResult<std::process::ExitStatus> {
        let mut cancel = self.cancel.clone();
        let deadline = self.timeout.map(|t| tokio::time::Instant::now() + t);

        let cancelled = async {
            match cancel.as_mut() {
                Some(rx) => {
                    while !*rx.borrow() {
                        if rx.changed().await.is_err() {
                            // Sender dropped: treat as "never cancelled"
                            std::future::pending::<()>().await;
                        }
                    }
                }
                None => std::future::pending().await,
            }
        };
        let timed_out = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            status = child.wait() => Ok(status?),
            _ = cancelled => {
                debug!("cancellation requested, killing ffmpeg");
                let _ = child.kill().await;
                Err(MediaError::Cancelled)
            }
            _ = timed_out => {
                warn!("ffmpeg timed out after {:?}, killing process", self.timeout);
                let _ = child.kill().await;
                Err(MediaError::Timeout(self.timeout.unwrap_or_default().as_secs()))
            }
        }
    }
}

/// Parse one `key=value` line from the `-progress` stream.
///
/// Returns a snapshot when the block terminator (`progress=`) arrives.
fn parse_progress_line(line: &str, current: &mut EncodeProgress) -> Option<EncodeProgress> {
    let (key, value) = line.trim().split_once('=')?;

    match key {
        "out_time_us" | "out_time_ms" => {
            // Both keys carry microseconds in modern FFmpeg
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = (us / 1000).max(current.out_time_ms);
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "fps" => {
            if let Ok(fps) = value.parse() {
                current.fps = fps;
            }
        }
        "speed" => {
            if let Some(stripped) = value.trim().strip_suffix('x') {
                if let Ok(speed) = stripped.parse() {
                    current.speed = speed;
                }
            }
        }
        "progress" => {
            current.is_complete = value == "end";
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_shape() {
        let cmd = FfmpegCommand::new("in.mp4", "out.mp4")
            .seek_fast(9.0)
            .seek_accurate(5.0)
            .duration(74.0)
            .video_codec("libx264")
            .crf(20)
            .preset("medium")
            .frame_rate(30);

        let args = cmd.build_args();
        let fast_ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(fast_ss < input, "fast seek must precede -i");
        assert_eq!(args[fast_ss + 1], "9.000");
        assert!(args.contains(&"-t".to_string()));
        assert!(args.contains(&"74.000".to_string()));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_stream_copy_args() {
        let args = FfmpegCommand::new("in.mp4", "out.mp4")
            .stream_copy()
            .normalize_timestamps()
            .build_args();
        let c = args.iter().position(|a| a == "-c").unwrap();
        assert_eq!(args[c + 1], "copy");
        assert!(args.contains(&"-avoid_negative_ts".to_string()));
    }

    #[test]
    fn test_progress_parsing() {
        let mut progress = EncodeProgress::default();

        assert!(parse_progress_line("frame=120", &mut progress).is_none());
        assert!(parse_progress_line("out_time_us=5000000", &mut progress).is_none());
        assert!(parse_progress_line("speed=1.5x", &mut progress).is_none());

        let snapshot = parse_progress_line("progress=continue", &mut progress).unwrap();
        assert_eq!(snapshot.frame, 120);
        assert_eq!(snapshot.out_time_ms, 5000);
        assert!((snapshot.speed - 1.5).abs() < 0.01);
        assert!(!snapshot.is_complete);

        let done = parse_progress_line("progress=end", &mut progress).unwrap();
        assert!(done.is_complete);
    }

    #[test]
    fn test_progress_time_never_regresses() {
        let mut progress = EncodeProgress::default();
        parse_progress_line("out_time_us=5000000", &mut progress);
        parse_progress_line("out_time_us=3000000", &mut progress);
        assert_eq!(progress.out_time_ms, 5000);
    }

    #[test]
    fn test_progress_ratio() {
        let progress = EncodeProgress {
            out_time_ms: 37_000,
            ..Default::default()
        };
        assert!((progress.ratio(74_000) - 0.5).abs() < 0.001);
        assert_eq!(progress.ratio(0), 0.0);
        // Never exceeds 1.0 even when FFmpeg overshoots
        assert_eq!(progress.ratio(30_000), 1.0);
    }
}
