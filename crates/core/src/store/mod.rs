//! Object storage adapters.
//!
//! Two collaborators live here:
//! - [`JobStore`]: the source bucket of uploaded media, with per-object tags
//!   used as leases.
//! - [`OutputSink`]: the bucket receiving encoded DASH output, keyed by job id.
//!
//! [`S3Store`] implements both against any S3-compatible service.

mod config;
mod error;
mod local;
mod s3;
mod traits;

pub use config::StorageConfig;
pub use error::StoreError;
pub use local::{collect_upload_files, content_type_for, object_key, UploadFile};
pub use s3::S3Store;
pub use traits::{ContentReader, JobStore, OutputSink};
