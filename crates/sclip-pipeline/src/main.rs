//! `sclip`: clip a time range out of a YouTube video.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sclip_license::{EntitlementGate, LicenseClient, TokenStore, DEFAULT_API_URL};
use sclip_models::{ClipOptions, ClipRequest, FormatId, JobState, TimeRange};
use sclip_pipeline::{JobManager, PipelineConfig, ToolStages};

#[derive(Debug, Parser)]
#[command(name = "sclip", about = "Clip a time range out of a YouTube video")]
struct Cli {
    /// Video URL or bare video id
    url: String,

    /// Clip start, seconds into the video
    #[arg(short, long)]
    start: f64,

    /// Clip end, seconds into the video
    #[arg(short, long)]
    end: f64,

    /// Output quality tier (480p, 720p-30, 720p-60, 1080p-30, 1080p-60, 1440p, 2160p)
    #[arg(short, long, default_value = "720p-30")]
    format: String,

    /// Directory the finished clip is saved to
    #[arg(short, long, default_value = ".")]
    dest: PathBuf,

    /// Burn subtitles into the clip
    #[arg(long)]
    subtitles: bool,

    /// Generate AI summary metadata (Pro)
    #[arg(long)]
    summary: bool,

    /// Cut silent passages
    #[arg(long)]
    remove_silence: bool,

    /// Higher bitrate encode
    #[arg(long)]
    high_quality: bool,

    /// License API endpoint
    #[arg(long, env = "SCLIP_LICENSE_API")]
    license_api: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let source_id = parse_source_id(&cli.url)
        .with_context(|| format!("cannot extract a video id from '{}'", cli.url))?;
    let format_id =
        FormatId::from_str(&cli.format).with_context(|| format!("unknown format '{}'", cli.format))?;
    let time_range = TimeRange::new(cli.start, cli.end).context("invalid time range")?;

    let request = ClipRequest {
        source_id,
        time_range,
        format_id,
        destination_dir: cli.dest.clone(),
        options: ClipOptions {
            subtitles: cli.subtitles,
            summary: cli.summary,
            remove_silence: cli.remove_silence,
            high_quality: cli.high_quality,
        },
    };

    // Entitlement gate: verify the stored activation token, if any
    let license_api = cli
        .license_api
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let gate = Arc::new(EntitlementGate::new(
        LicenseClient::new(license_api),
        TokenStore::default_location(),
    ));
    match gate.refresh().await {
        Ok(entitlement) => info!(tier = entitlement.tier.as_str(), "entitlement verified"),
        Err(e) => warn!(error = %e, "entitlement not verified, using free tier"),
    }

    let config = PipelineConfig::from_env();
    let stages = Arc::new(ToolStages::new(config.clone()));
    let manager = JobManager::new(config, stages, gate);

    let job_id = manager
        .submit(request)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let mut updates = manager
        .subscribe(&job_id)
        .context("job vanished immediately after submit")?;

    let mut last_line = String::new();
    loop {
        let job = updates.borrow_and_update().clone();

        let line = format!("[{:>3}%] {}", job.progress_percent, job.progress_label);
        if line != last_line {
            println!("{}", line);
            last_line = line;
        }

        if job.is_terminal() {
            manager.acknowledge(&job_id);
            match job.state {
                JobState::Ready => {
                    if let Some(warning) = &job.warning {
                        println!("warning: {}", warning);
                    }
                    println!(
                        "clip saved: {}",
                        job.result_path
                            .as_deref()
                            .map(|p| p.display().to_string())
                            .unwrap_or_default()
                    );
                    return Ok(());
                }
                JobState::Cancelled => bail!("job cancelled"),
                _ => {
                    let error = job
                        .error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "unknown error".to_string());
                    bail!("job failed: {}", error);
                }
            }
        }

        if updates.changed().await.is_err() {
            bail!("job runner stopped without a terminal state");
        }
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sclip=info,sclip_pipeline=info,sclip_media=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

/// Extract the video id from a URL or accept a bare id.
fn parse_source_id(input: &str) -> Option<String> {
    let input = input.trim();

    if let Some(rest) = input
        .strip_prefix("https://youtu.be/")
        .or_else(|| input.strip_prefix("http://youtu.be/"))
        .or_else(|| input.strip_prefix("youtu.be/"))
    {
        return valid_id(rest.split(['?', '&']).next()?);
    }

    if input.contains("youtube.com/watch") {
        let query = input.split('?').nth(1)?;
        let id = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("v="))?;
        return valid_id(id);
    }

    if let Some(idx) = input.find("/embed/") {
        let rest = &input[idx + "/embed/".len()..];
        return valid_id(rest.split(['?', '&']).next()?);
    }

    // Bare id
    valid_id(input)
}

fn valid_id(candidate: &str) -> Option<String> {
    let ok = candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    ok.then(|| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_watch_url() {
        assert_eq!(
            parse_source_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            parse_source_id("https://youtube.com/watch?v=dQw4w9WgXcQ&list=xyz").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_parse_short_url() {
        assert_eq!(
            parse_source_id("https://youtu.be/dQw4w9WgXcQ?t=10").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_parse_embed_url() {
        assert_eq!(
            parse_source_id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_parse_bare_id() {
        assert_eq!(
            parse_source_id("dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_source_id("https://example.com/video").is_none());
        assert!(parse_source_id("too-short").is_none());
        assert!(parse_source_id("https://youtube.com/watch").is_none());
    }
}
