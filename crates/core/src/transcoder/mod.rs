//! DASH transcoding.
//!
//! A [`Transcoder`] turns one local media file into a local directory holding a
//! `dash.mpd` manifest plus init and media segments. [`FfmpegTranscoder`]
//! shells out to ffmpeg with a fixed three-rung bitrate ladder.

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::TranscoderConfig;
pub use error::TranscoderError;
pub use ffmpeg::{FfmpegTranscoder, MANIFEST_NAME, OUTPUT_DIR_PREFIX};
pub use traits::Transcoder;
pub use types::{HwAccel, Preset, VideoQuality};
