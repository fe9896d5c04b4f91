//! Types describing DASH encoding settings.

use serde::{Deserialize, Serialize};

/// x264 style encoder preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    #[default]
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl Preset {
    /// Value passed to `-preset`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Superfast => "superfast",
            Self::Veryfast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::Veryslow => "veryslow",
        }
    }
}

/// Hardware acceleration backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HwAccel {
    /// Software encoding (libx264).
    #[default]
    None,
    /// Intel Quick Sync Video.
    Qsv,
}

impl HwAccel {
    /// Video encoder for this backend.
    pub fn video_codec(&self) -> &'static str {
        match self {
            Self::None => "libx264",
            Self::Qsv => "h264_qsv",
        }
    }

    /// Name of the scale filter for this backend.
    pub fn scale_filter(&self) -> &'static str {
        match self {
            Self::None => "scale",
            Self::Qsv => "scale_qsv",
        }
    }
}

/// One rung of the video bitrate ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoQuality {
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl VideoQuality {
    /// The default ladder, lowest first.
    pub const LADDER: [VideoQuality; 3] = [Self::P360, Self::P720, Self::P1080];

    /// Scale expression (`w:h`, width follows aspect ratio).
    pub fn scale(&self) -> &'static str {
        match self {
            Self::P360 => "-1:360",
            Self::P720 => "-1:720",
            Self::P1080 => "-1:1080",
        }
    }

    pub fn bitrate(&self) -> &'static str {
        match self {
            Self::P360 => "365k",
            Self::P720 => "4.5M",
            Self::P1080 => "7.8M",
        }
    }

    pub fn max_bitrate(&self) -> &'static str {
        match self {
            Self::P360 => "390k",
            Self::P720 => "4.8M",
            Self::P1080 => "8.3M",
        }
    }

    pub fn bufsize(&self) -> &'static str {
        match self {
            Self::P360 => "640k",
            Self::P720 => "8M",
            Self::P1080 => "14M",
        }
    }
}
