//! Error types for the lease module.

use thiserror::Error;

use crate::store::StoreError;

/// Errors from a single claim attempt.
///
/// None of these are fatal; the scan is retried on the next tick.
#[derive(Debug, Error)]
pub enum LeaseError {
    /// Listing the source store failed.
    #[error("failed to list jobs: {0}")]
    List(#[source] StoreError),

    /// Writing the lease tags failed.
    #[error("failed to tag job {job_id}: {source}")]
    Tag { job_id: String, source: StoreError },

    /// Opening or streaming the source content failed.
    #[error("failed to download job {job_id}: {source}")]
    Download { job_id: String, source: StoreError },

    /// Writing the local copy failed.
    #[error("failed to write local copy of job {job_id}: {source}")]
    LocalFile {
        job_id: String,
        source: std::io::Error,
    },
}

impl LeaseError {
    /// Job the error concerns, if it got that far.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::List(_) => None,
            Self::Tag { job_id, .. }
            | Self::Download { job_id, .. }
            | Self::LocalFile { job_id, .. } => Some(job_id),
        }
    }
}
