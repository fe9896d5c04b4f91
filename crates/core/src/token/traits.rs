//! Trait definitions for the token module.

use async_trait::async_trait;

use super::error::TokenError;

/// Issues and verifies playback tokens scoped to a set of media ids.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Creates a token granting access to `media_ids`.
    async fn create_token(&self, media_ids: &[String]) -> Result<String, TokenError>;

    /// Returns the media ids a token grants access to.
    async fn media_ids_from_token(&self, token: &str) -> Result<Vec<String>, TokenError>;
}
