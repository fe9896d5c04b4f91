//! Trait definitions for the transcoder module.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::error::TranscoderError;

/// Turns one local media file into a local directory of DASH output.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Encodes `input` and returns a fresh output directory.
    ///
    /// All-or-nothing: on error no output directory is left behind. May take
    /// arbitrarily long.
    async fn encode(
        &self,
        job_id: &str,
        input: &Path,
        audio_only: bool,
    ) -> Result<PathBuf, TranscoderError>;

    /// Validates that the transcoder is properly configured and ready.
    async fn validate(&self) -> Result<(), TranscoderError>;
}
