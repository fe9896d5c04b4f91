//! Playback token contract.
//!
//! The serving layer hands viewers a token naming the media they may fetch.
//! Only the boundary lives here; issuing and verifying tokens is done by the
//! serving deployment.

mod error;
mod traits;

pub use error::TokenError;
pub use traits::TokenIssuer;
