//! Trait definitions for the store module.

use std::collections::HashMap;
use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::io::AsyncRead;

use super::error::StoreError;
use crate::job::SourceJob;

/// Streamed object content.
pub type ContentReader = Pin<Box<dyn AsyncRead + Send>>;

/// The source store holding uploaded, not yet encoded media.
///
/// Listing has no ordering guarantee. Tags are read and written without any
/// compare-and-swap; callers must tolerate concurrent writers.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Returns the name of this store implementation.
    fn name(&self) -> &str;

    /// Lists every source object with its tags.
    ///
    /// The stream is finite and cannot be restarted. Dropping it early is
    /// fine.
    fn list_jobs(&self) -> BoxStream<'_, Result<SourceJob, StoreError>>;

    /// Replaces the tag set of an object.
    async fn set_tags(&self, id: &str, tags: HashMap<String, String>) -> Result<(), StoreError>;

    /// Removes every tag from an object.
    async fn remove_tags(&self, id: &str) -> Result<(), StoreError>;

    /// Opens the content of an object for reading.
    async fn get_content(&self, id: &str) -> Result<ContentReader, StoreError>;

    /// Deletes an object. Deleting a missing object succeeds.
    async fn delete_content(&self, id: &str) -> Result<(), StoreError>;

    /// Verifies the backing bucket is reachable.
    async fn check_connectivity(&self) -> Result<(), StoreError>;
}

/// Durable destination for encoded output, keyed by job id.
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Returns the name of this sink implementation.
    fn name(&self) -> &str;

    /// Uploads every file under `local_dir` to `<job_id>/<relative path>`.
    ///
    /// Uploading the same job twice overwrites the earlier output.
    async fn upload(&self, job_id: &str, local_dir: &Path) -> Result<(), StoreError>;

    /// Opens one uploaded file for reading.
    async fn get_object(&self, job_id: &str, file_name: &str)
        -> Result<ContentReader, StoreError>;

    /// Verifies the backing bucket is reachable.
    async fn check_connectivity(&self) -> Result<(), StoreError>;
}
