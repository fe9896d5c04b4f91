//! Completion pipeline: upload, delete source, clean up.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::job::EncodeRequest;
use crate::metrics;
use crate::store::{JobStore, OutputSink};

/// Per-step outcome of one completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    pub job_id: String,
    /// Output reached the sink.
    pub uploaded: bool,
    /// Source object removed. Never attempted when the upload failed.
    pub source_deleted: bool,
    /// Local output dir and input file removed.
    pub cleaned_up: bool,
}

impl CompletionReport {
    /// Whether every step succeeded.
    pub fn is_complete(&self) -> bool {
        self.uploaded && self.source_deleted && self.cleaned_up
    }
}

/// Finishes a successful encode in the background.
///
/// Steps run in order: upload the output, delete the source only if the
/// upload succeeded, then always remove local files. Failures are logged;
/// nothing is retried or rolled back.
///
/// Spawned tasks are tracked so shutdown can wait for uploads already under
/// way. Clones share the same tracker.
#[derive(Clone)]
pub struct CompletionPipeline {
    store: Arc<dyn JobStore>,
    sink: Arc<dyn OutputSink>,
    limit: Option<Arc<Semaphore>>,
    tracker: TaskTracker,
}

impl CompletionPipeline {
    pub fn new(store: Arc<dyn JobStore>, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            store,
            sink,
            limit: None,
            tracker: TaskTracker::new(),
        }
    }

    /// Bounds how many completions run at once. Unbounded by default.
    pub fn with_max_concurrent(mut self, max: Option<usize>) -> Self {
        self.limit = max.map(|n| Arc::new(Semaphore::new(n)));
        self
    }

    /// Runs the completion on a detached, tracked task.
    pub fn spawn(
        &self,
        request: EncodeRequest,
        output_dir: PathBuf,
    ) -> JoinHandle<CompletionReport> {
        let pipeline = self.clone();
        self.tracker
            .spawn(async move { pipeline.complete(request, output_dir).await })
    }

    /// Completions spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Closes the tracker and waits up to `limit` for spawned completions.
    /// Returns how many were still running at the deadline; those are left
    /// to finish or die with the runtime.
    pub async fn drain(&self, limit: Duration) -> usize {
        self.tracker.close();
        if tokio::time::timeout(limit, self.tracker.wait()).await.is_err() {
            let remaining = self.tracker.len();
            warn!(remaining, "Completions still running after drain timeout");
            return remaining;
        }
        0
    }

    /// Runs the completion steps in place.
    pub async fn complete(
        &self,
        request: EncodeRequest,
        output_dir: PathBuf,
    ) -> CompletionReport {
        let _permit = match &self.limit {
            Some(limit) => Arc::clone(limit).acquire_owned().await.ok(),
            None => None,
        };
        metrics::COMPLETIONS_IN_FLIGHT.inc();

        let job_id = request.job_id.as_str();

        let uploaded = match self.sink.upload(job_id, &output_dir).await {
            Ok(()) => {
                info!(job_id = %job_id, sink = self.sink.name(), "Uploaded output");
                true
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Upload failed, keeping source");
                false
            }
        };
        metrics::record_step("upload", uploaded);

        let source_deleted = if uploaded {
            let deleted = match self.store.delete_content(job_id).await {
                Ok(()) => {
                    info!(job_id = %job_id, "Deleted source");
                    true
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Failed to delete source");
                    false
                }
            };
            metrics::record_step("delete_source", deleted);
            deleted
        } else {
            false
        };

        let dir_removed = remove_dir_logged(&output_dir).await;
        let input_removed = remove_file_logged(&request.local_path).await;
        let cleaned_up = dir_removed && input_removed;
        metrics::record_step("cleanup", cleaned_up);

        metrics::COMPLETIONS_IN_FLIGHT.dec();

        CompletionReport {
            job_id: request.job_id,
            uploaded,
            source_deleted,
            cleaned_up,
        }
    }
}

/// Removes a local file, logging instead of failing. A missing file counts
/// as removed.
pub(crate) async fn remove_file_logged(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove local file");
            false
        }
    }
}

async fn remove_dir_logged(path: &Path) -> bool {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove output directory");
            false
        }
    }
}
