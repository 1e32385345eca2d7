#![deny(unreachable_patterns)]
//! FFmpeg / yt-dlp wrapper for clip production.
//!
//! This crate provides:
//! - External tool probing (`deps`)
//! - Type-safe FFmpeg command building with progress parsing and prompt
//!   cancellation (`command`)
//! - Source acquisition with quality fallback (`resolve`)
//! - Seek-accurate trimming and transcoding (`trim`)
//! - Subtitle fetch/retime/burn-in and silence removal (`subtitles`,
//!   `silence`)

pub mod command;
pub mod deps;
pub mod error;
pub mod fs;
pub mod probe;
pub mod resolve;
pub mod silence;
pub mod subtitles;
pub mod trim;

pub use command::{EncodeProgress, FfmpegCommand, FfmpegRunner};
pub use deps::{ExternalTool, SystemProber, ToolProbe};
pub use error::{MediaError, MediaResult};
pub use fs::{dir_is_writable, move_file};
pub use probe::{probe_media, SourceInfo};
pub use resolve::{
    fetch_source_metadata, resolve_source, select_actual_format, OfferedFormat, ResolvedSource,
    SourceMetadata,
};
pub use silence::{apply_silence_cuts, detect_silence, plan_keeps, KeepSegment, SilenceSpan};
pub use subtitles::{burn_subtitles, fetch_subtitles, shift_srt};
pub use trim::{needs_reencode, trim_clip, TrimSpec};
