//! Configuration for the transcoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::types::{HwAccel, Preset, VideoQuality};

/// Configuration for the FFmpeg-based DASH transcoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Directory receiving per-job output directories.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Directory receiving one ffmpeg log file per job.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Hardware acceleration backend.
    #[serde(default)]
    pub hw_accel: HwAccel,

    /// Encoder preset.
    #[serde(default)]
    pub preset: Preset,

    /// Output frame rate.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Audio codec.
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Video representations to produce, lowest first.
    #[serde(default = "default_qualities")]
    pub qualities: Vec<VideoQuality>,

    /// DASH segment duration in seconds.
    #[serde(default = "default_segment_secs")]
    pub segment_secs: u32,

    /// Kill ffmpeg after this many seconds. Unset means no limit.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Additional ffmpeg arguments inserted before the output.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("dashcoder")
}

fn default_log_dir() -> PathBuf {
    std::env::temp_dir().join("dashcoder").join("logs")
}

fn default_fps() -> u32 {
    30
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_qualities() -> Vec<VideoQuality> {
    VideoQuality::LADDER.to_vec()
}

fn default_segment_secs() -> u32 {
    4
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            work_dir: default_work_dir(),
            log_dir: default_log_dir(),
            hw_accel: HwAccel::default(),
            preset: Preset::default(),
            fps: default_fps(),
            audio_codec: default_audio_codec(),
            qualities: default_qualities(),
            segment_secs: default_segment_secs(),
            timeout_secs: None,
            extra_ffmpeg_args: Vec::new(),
        }
    }
}

impl TranscoderConfig {
    /// Sets the ffmpeg binary.
    pub fn with_ffmpeg_path(mut self, path: PathBuf) -> Self {
        self.ffmpeg_path = path;
        self
    }

    /// Sets the work and log directories.
    pub fn with_dirs(mut self, work_dir: PathBuf, log_dir: PathBuf) -> Self {
        self.work_dir = work_dir;
        self.log_dir = log_dir;
        self
    }

    /// Sets the hardware acceleration backend.
    pub fn with_hw_accel(mut self, hw_accel: HwAccel) -> Self {
        self.hw_accel = hw_accel;
        self
    }

    /// Sets the encoder preset.
    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }
}
