//! Lease acquisition and release.
//!
//! Workers coordinate through two tags on each source object, `startAt` and
//! `hostname`. There is no compare-and-swap: two workers may both claim an
//! expired job, and the completion steps tolerate that.

mod config;
mod error;
mod manager;

pub use config::LeaseConfig;
pub use error::LeaseError;
pub use manager::{LeaseManager, ReleaseSummary, DOWNLOAD_PREFIX};
