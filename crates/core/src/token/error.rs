//! Error types for the token module.

use thiserror::Error;

/// Errors raised by a [`TokenIssuer`](super::TokenIssuer).
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token could not be parsed or its signature did not verify.
    #[error("invalid token: {0}")]
    Invalid(String),

    /// The token was valid once but has expired.
    #[error("token expired")]
    Expired,

    /// Signing failed.
    #[error("failed to issue token: {0}")]
    IssueFailed(String),
}
