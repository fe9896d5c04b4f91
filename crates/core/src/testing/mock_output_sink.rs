//! Mock output sink for testing.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::store::{collect_upload_files, ContentReader, OutputSink, StoreError};

/// A recorded upload for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    /// Job the output belongs to.
    pub job_id: String,
    /// Object keys written, in upload order.
    pub keys: Vec<String>,
    /// Whether the upload succeeded.
    pub success: bool,
}

/// In-memory implementation of [`OutputSink`].
///
/// Uploaded files are read into memory so tests can inspect them after the
/// local output directory has been cleaned up.
#[derive(Debug, Clone)]
pub struct MockOutputSink {
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    uploads: Arc<RwLock<Vec<RecordedUpload>>>,
    next_error: Arc<RwLock<Option<StoreError>>>,
    upload_delay: Arc<RwLock<Option<Duration>>>,
}

impl Default for MockOutputSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOutputSink {
    /// Create an empty mock sink.
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            uploads: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            upload_delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Configure the next upload to fail with the given error.
    pub async fn set_next_error(&self, error: StoreError) {
        *self.next_error.write().await = Some(error);
    }

    /// Delay every upload by `delay` before anything is written.
    pub async fn set_upload_delay(&self, delay: Duration) {
        *self.upload_delay.write().await = Some(delay);
    }

    /// Get all recorded uploads.
    pub async fn recorded_uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.read().await.clone()
    }

    /// Get the number of successful uploads for a job.
    pub async fn upload_count(&self, job_id: &str) -> usize {
        self.uploads
            .read()
            .await
            .iter()
            .filter(|u| u.job_id == job_id && u.success)
            .count()
    }

    /// All stored object keys.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Content of a stored object.
    pub async fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).cloned()
    }
}

#[async_trait]
impl OutputSink for MockOutputSink {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload(&self, job_id: &str, local_dir: &Path) -> Result<(), StoreError> {
        let delay = *self.upload_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            self.uploads.write().await.push(RecordedUpload {
                job_id: job_id.to_string(),
                keys: Vec::new(),
                success: false,
            });
            return Err(error);
        }

        let files = collect_upload_files(job_id, local_dir).await?;
        let mut keys = Vec::with_capacity(files.len());
        for file in files {
            let content = tokio::fs::read(&file.path)
                .await
                .map_err(|e| StoreError::upload_failed(&file.key, e))?;
            self.objects.write().await.insert(file.key.clone(), content);
            keys.push(file.key);
        }

        self.uploads.write().await.push(RecordedUpload {
            job_id: job_id.to_string(),
            keys,
            success: true,
        });
        Ok(())
    }

    async fn get_object(&self, job_id: &str, file_name: &str) -> Result<ContentReader, StoreError> {
        let key = format!("{job_id}/{file_name}");
        let content = self
            .objects
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or(StoreError::NotFound(key))?;
        Ok(Box::pin(io::Cursor::new(content)))
    }

    async fn check_connectivity(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
