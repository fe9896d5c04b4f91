//! Testing utilities and mock implementations.
//!
//! This module provides in-memory implementations of every collaborator
//! trait, so the lease manager, worker and orchestrator can be exercised
//! without an object store or ffmpeg.
//!
//! # Example
//!
//! ```rust,ignore
//! use dashcoder_core::testing::{MockJobStore, MockOutputSink, MockTranscoder};
//!
//! let store = MockJobStore::new();
//! store.insert("movie.mp4", b"...").await;
//!
//! let transcoder = MockTranscoder::new();
//! transcoder.hold().await; // keep the first encode busy
//! ```

mod mock_job_store;
mod mock_output_sink;
mod mock_token_issuer;
mod mock_transcoder;

pub use mock_job_store::{MockJobStore, StoreCall, StoreOperation};
pub use mock_output_sink::{MockOutputSink, RecordedUpload};
pub use mock_token_issuer::MockTokenIssuer;
pub use mock_transcoder::{MockTranscoder, RecordedEncode};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;

    use crate::job::{HostIdentity, Lease, TAG_HOSTNAME, TAG_START_AT};

    /// Lease tags as written by `owner` at `started_at`.
    pub fn lease_tags(owner: &str, started_at: DateTime<Utc>) -> HashMap<String, String> {
        Lease::new(&HostIdentity::new(owner), started_at).to_tags()
    }

    /// Raw lease tags, for malformed or foreign-format values.
    pub fn raw_lease_tags(owner: &str, start_at: &str) -> HashMap<String, String> {
        HashMap::from([
            (TAG_START_AT.to_string(), start_at.to_string()),
            (TAG_HOSTNAME.to_string(), owner.to_string()),
        ])
    }
}
