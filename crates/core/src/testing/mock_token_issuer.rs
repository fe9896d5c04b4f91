//! Mock token issuer for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::token::{TokenError, TokenIssuer};

/// In-memory implementation of [`TokenIssuer`].
///
/// Tokens are opaque sequential strings remembered in a map.
#[derive(Debug, Clone)]
pub struct MockTokenIssuer {
    tokens: Arc<RwLock<HashMap<String, Vec<String>>>>,
    next_error: Arc<RwLock<Option<TokenError>>>,
    issued: Arc<AtomicU64>,
}

impl Default for MockTokenIssuer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTokenIssuer {
    pub fn new() -> Self {
        Self {
            tokens: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            issued: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: TokenError) {
        *self.next_error.write().await = Some(error);
    }

    /// Forget a token, as if it had expired.
    pub async fn revoke(&self, token: &str) {
        self.tokens.write().await.remove(token);
    }
}

#[async_trait]
impl TokenIssuer for MockTokenIssuer {
    async fn create_token(&self, media_ids: &[String]) -> Result<String, TokenError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        let token = format!("mock-token-{}", self.issued.fetch_add(1, Ordering::SeqCst) + 1);
        self.tokens
            .write()
            .await
            .insert(token.clone(), media_ids.to_vec());
        Ok(token)
    }

    async fn media_ids_from_token(&self, token: &str) -> Result<Vec<String>, TokenError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        self.tokens
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or_else(|| TokenError::Invalid(token.to_string()))
    }
}
