//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while encoding.
#[derive(Debug, Error)]
pub enum TranscoderError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Output directory could not be created.
    #[error("Failed to create output directory: {path}")]
    OutputDirectoryFailed { path: PathBuf },

    /// Per-job log file could not be created.
    #[error("Failed to create log file: {path}")]
    LogFileFailed { path: PathBuf },

    /// Encoding process failed.
    #[error("Encoding failed: {reason}")]
    EncodeFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Encoding timed out.
    #[error("Encoding timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error during encoding.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscoderError {
    /// Creates a new encode failed error with stderr output.
    pub fn encode_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::EncodeFailed {
            reason: reason.into(),
            stderr,
        }
    }
}
