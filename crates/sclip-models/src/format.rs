//! Output format tiers (resolution + frame rate).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A resolution/frame-rate tier offered by the format picker.
///
/// Tiers at 1080p and above require a Pro entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum FormatId {
    /// 3840x2160 @ 30fps
    #[serde(rename = "2160p")]
    Uhd2160,
    /// 2560x1440 @ 30fps
    #[serde(rename = "1440p")]
    Qhd1440,
    /// 1920x1080 @ 60fps
    #[serde(rename = "1080p-60")]
    Fhd1080p60,
    /// 1920x1080 @ 30fps
    #[serde(rename = "1080p-30")]
    Fhd1080p30,
    /// 1280x720 @ 60fps
    #[serde(rename = "720p-60")]
    Hd720p60,
    /// 1280x720 @ 30fps
    #[serde(rename = "720p-30")]
    Hd720p30,
    /// 854x480 @ 30fps
    #[serde(rename = "480p")]
    Sd480,
}

impl FormatId {
    /// All tiers ordered best to worst, for at-or-below fallback.
    pub fn ladder() -> &'static [FormatId] {
        &[
            FormatId::Uhd2160,
            FormatId::Qhd1440,
            FormatId::Fhd1080p60,
            FormatId::Fhd1080p30,
            FormatId::Hd720p60,
            FormatId::Hd720p30,
            FormatId::Sd480,
        ]
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        match self {
            FormatId::Uhd2160 => 2160,
            FormatId::Qhd1440 => 1440,
            FormatId::Fhd1080p60 | FormatId::Fhd1080p30 => 1080,
            FormatId::Hd720p60 | FormatId::Hd720p30 => 720,
            FormatId::Sd480 => 480,
        }
    }

    /// Target frame rate.
    pub fn fps(&self) -> u32 {
        match self {
            FormatId::Fhd1080p60 | FormatId::Hd720p60 => 60,
            _ => 30,
        }
    }

    /// Whether this tier is gated behind the Pro entitlement.
    pub fn requires_pro(&self) -> bool {
        self.height() >= 1080
    }

    /// True if `self` is at or below `other` in both height and frame rate.
    pub fn fits_within(&self, other: FormatId) -> bool {
        self.height() <= other.height() && self.fps() <= other.fps()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatId::Uhd2160 => "2160p",
            FormatId::Qhd1440 => "1440p",
            FormatId::Fhd1080p60 => "1080p-60",
            FormatId::Fhd1080p30 => "1080p-30",
            FormatId::Hd720p60 => "720p-60",
            FormatId::Hd720p30 => "720p-30",
            FormatId::Sd480 => "480p",
        }
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unknown format identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFormat(pub String);

impl fmt::Display for UnknownFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown format id: {}", self.0)
    }
}

impl std::error::Error for UnknownFormat {}

impl FromStr for FormatId {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2160p" | "4k" => Ok(FormatId::Uhd2160),
            "1440p" => Ok(FormatId::Qhd1440),
            "1080p-60" => Ok(FormatId::Fhd1080p60),
            "1080p-30" | "1080p" => Ok(FormatId::Fhd1080p30),
            "720p-60" => Ok(FormatId::Hd720p60),
            "720p-30" | "720p" => Ok(FormatId::Hd720p30),
            "480p" => Ok(FormatId::Sd480),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}
