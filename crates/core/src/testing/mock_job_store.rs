//! Mock job store for testing.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::RwLock;

use crate::job::SourceJob;
use crate::store::{ContentReader, JobStore, StoreError};

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    List,
    SetTags,
    RemoveTags,
    GetContent,
    DeleteContent,
}

/// A recorded store call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List,
    SetTags {
        id: String,
        tags: HashMap<String, String>,
    },
    RemoveTags {
        id: String,
    },
    GetContent {
        id: String,
    },
    DeleteContent {
        id: String,
    },
}

#[derive(Debug, Clone, Default)]
struct MockObject {
    content: Vec<u8>,
    tags: HashMap<String, String>,
    broken_read: bool,
}

/// In-memory implementation of [`JobStore`].
///
/// Objects are listed in key order, like S3. Provides controllable behavior
/// for testing:
/// - Seed objects with arbitrary content and tags
/// - Inject one-shot failures per operation
/// - Make reads fail part way through
/// - Slow down listing
/// - Record every call in order
#[derive(Debug, Clone)]
pub struct MockJobStore {
    objects: Arc<RwLock<BTreeMap<String, MockObject>>>,
    calls: Arc<RwLock<Vec<StoreCall>>>,
    next_errors: Arc<RwLock<HashMap<StoreOperation, StoreError>>>,
    list_delay: Arc<RwLock<Option<Duration>>>,
}

impl Default for MockJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockJobStore {
    /// Create an empty mock store.
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            next_errors: Arc::new(RwLock::new(HashMap::new())),
            list_delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Add an untagged object.
    pub async fn insert(&self, id: &str, content: &[u8]) {
        self.insert_tagged(id, content, HashMap::new()).await;
    }

    /// Add an object carrying the given tags.
    pub async fn insert_tagged(&self, id: &str, content: &[u8], tags: HashMap<String, String>) {
        self.objects.write().await.insert(
            id.to_string(),
            MockObject {
                content: content.to_vec(),
                tags,
                broken_read: false,
            },
        );
    }

    /// Make reads of `id` fail after the first bytes.
    pub async fn break_reads(&self, id: &str) {
        if let Some(object) = self.objects.write().await.get_mut(id) {
            object.broken_read = true;
        }
    }

    /// Whether an object still exists.
    pub async fn contains(&self, id: &str) -> bool {
        self.objects.read().await.contains_key(id)
    }

    /// Current tags of an object.
    pub async fn tags(&self, id: &str) -> Option<HashMap<String, String>> {
        self.objects.read().await.get(id).map(|o| o.tags.clone())
    }

    /// Keys of all stored objects.
    pub async fn ids(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Configure the next call of `operation` to fail with `error`.
    pub async fn set_next_error(&self, operation: StoreOperation, error: StoreError) {
        self.next_errors.write().await.insert(operation, error);
    }

    /// Delay every listing by `delay`.
    pub async fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.write().await = Some(delay);
    }

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<StoreCall> {
        self.calls.read().await.clone()
    }

    async fn record(&self, call: StoreCall) {
        self.calls.write().await.push(call);
    }

    async fn take_error(&self, operation: StoreOperation) -> Option<StoreError> {
        self.next_errors.write().await.remove(&operation)
    }

    async fn snapshot(&self) -> Vec<Result<SourceJob, StoreError>> {
        self.record(StoreCall::List).await;
        let delay = *self.list_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.take_error(StoreOperation::List).await {
            return vec![Err(error)];
        }
        self.objects
            .read()
            .await
            .iter()
            .map(|(id, object)| Ok(SourceJob::with_tags(id.clone(), object.tags.clone())))
            .collect()
    }
}

#[async_trait]
impl JobStore for MockJobStore {
    fn name(&self) -> &str {
        "mock"
    }

    fn list_jobs(&self) -> BoxStream<'_, Result<SourceJob, StoreError>> {
        stream::once(self.snapshot())
            .flat_map(stream::iter)
            .boxed()
    }

    async fn set_tags(&self, id: &str, tags: HashMap<String, String>) -> Result<(), StoreError> {
        self.record(StoreCall::SetTags {
            id: id.to_string(),
            tags: tags.clone(),
        })
        .await;
        if let Some(error) = self.take_error(StoreOperation::SetTags).await {
            return Err(error);
        }
        let mut objects = self.objects.write().await;
        let object = objects
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        object.tags = tags;
        Ok(())
    }

    async fn remove_tags(&self, id: &str) -> Result<(), StoreError> {
        self.record(StoreCall::RemoveTags { id: id.to_string() }).await;
        if let Some(error) = self.take_error(StoreOperation::RemoveTags).await {
            return Err(error);
        }
        let mut objects = self.objects.write().await;
        let object = objects
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        object.tags.clear();
        Ok(())
    }

    async fn get_content(&self, id: &str) -> Result<ContentReader, StoreError> {
        self.record(StoreCall::GetContent { id: id.to_string() }).await;
        if let Some(error) = self.take_error(StoreOperation::GetContent).await {
            return Err(error);
        }
        let objects = self.objects.read().await;
        let object = objects
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if object.broken_read {
            return Ok(Box::pin(BrokenReader {
                prefix: Some(object.content.iter().take(4).copied().collect()),
            }));
        }
        Ok(Box::pin(io::Cursor::new(object.content.clone())))
    }

    async fn delete_content(&self, id: &str) -> Result<(), StoreError> {
        self.record(StoreCall::DeleteContent { id: id.to_string() })
            .await;
        if let Some(error) = self.take_error(StoreOperation::DeleteContent).await {
            return Err(error);
        }
        self.objects.write().await.remove(id);
        Ok(())
    }

    async fn check_connectivity(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Yields a few bytes, then fails like a dropped connection.
struct BrokenReader {
    prefix: Option<Vec<u8>>,
}

impl AsyncRead for BrokenReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.prefix.take() {
            Some(bytes) => {
                let n = bytes.len().min(buf.remaining());
                buf.put_slice(&bytes[..n]);
                Poll::Ready(Ok(()))
            }
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset mid-body",
            ))),
        }
    }
}
