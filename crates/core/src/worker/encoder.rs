//! Encode worker: one transcode at a time, fed by the lease scanner.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::completion::{remove_file_logged, CompletionPipeline};
use crate::job::EncodeRequest;
use crate::metrics;
use crate::transcoder::Transcoder;

/// Counters reported when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub encodes_succeeded: usize,
    pub encodes_failed: usize,
    /// Requests buffered in the channel when cancellation arrived.
    pub dropped_on_shutdown: usize,
}

/// Consumes [`EncodeRequest`]s and runs them through the transcoder.
pub struct EncodeWorker {
    transcoder: Arc<dyn Transcoder>,
    completion: CompletionPipeline,
}

impl EncodeWorker {
    pub fn new(transcoder: Arc<dyn Transcoder>, completion: CompletionPipeline) -> Self {
        Self {
            transcoder,
            completion,
        }
    }

    /// Processes requests until the channel closes or `cancel` fires.
    ///
    /// An encode that has started always runs to the end. Requests still
    /// buffered after cancellation are dropped and their local files removed;
    /// their leases are left to the shutdown release.
    pub async fn run(
        self,
        mut rx: mpsc::Receiver<EncodeRequest>,
        cancel: CancellationToken,
    ) -> WorkerStats {
        let mut stats = WorkerStats::default();
        info!(transcoder = self.transcoder.name(), "Encode worker started");

        loop {
            let request = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                request = rx.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };
            self.process(request, &mut stats).await;
        }

        // A scan may still hold a reserved slot; recv only returns None once
        // that permit has been used or released.
        rx.close();
        while let Some(request) = rx.recv().await {
            warn!(job_id = %request.job_id, "Dropping unstarted request on shutdown");
            remove_file_logged(&request.local_path).await;
            stats.dropped_on_shutdown += 1;
        }

        info!(
            succeeded = stats.encodes_succeeded,
            failed = stats.encodes_failed,
            dropped = stats.dropped_on_shutdown,
            "Encode worker stopped"
        );
        stats
    }

    async fn process(&self, request: EncodeRequest, stats: &mut WorkerStats) {
        let start = Instant::now();
        info!(job_id = %request.job_id, "Encoding");

        match self
            .transcoder
            .encode(&request.job_id, &request.local_path, false)
            .await
        {
            Ok(output_dir) => {
                let elapsed = start.elapsed();
                info!(
                    job_id = %request.job_id,
                    duration_secs = elapsed.as_secs_f64(),
                    "Encode finished"
                );
                metrics::ENCODES_TOTAL.with_label_values(&["success"]).inc();
                metrics::ENCODE_DURATION.observe(elapsed.as_secs_f64());
                stats.encodes_succeeded += 1;
                drop(self.completion.spawn(request, output_dir));
            }
            Err(e) => {
                error!(job_id = %request.job_id, error = %e, "Encode failed");
                metrics::ENCODES_TOTAL.with_label_values(&["failed"]).inc();
                stats.encodes_failed += 1;
                remove_file_logged(&request.local_path).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockJobStore, MockOutputSink, MockTranscoder};
    use crate::transcoder::TranscoderError;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        store: MockJobStore,
        sink: MockOutputSink,
        transcoder: MockTranscoder,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                store: MockJobStore::new(),
                sink: MockOutputSink::new(),
                transcoder: MockTranscoder::new(),
            }
        }

        fn worker(&self) -> EncodeWorker {
            let completion = CompletionPipeline::new(
                Arc::new(self.store.clone()),
                Arc::new(self.sink.clone()),
            );
            EncodeWorker::new(Arc::new(self.transcoder.clone()), completion)
        }

        async fn request(&self, job_id: &str) -> EncodeRequest {
            self.store.insert(job_id, b"source").await;
            let path: PathBuf = self.dir.path().join(format!("{job_id}.src"));
            tokio::fs::write(&path, b"source").await.unwrap();
            EncodeRequest::new(job_id, path)
        }
    }

    async fn wait_for_upload(sink: &MockOutputSink, job_id: &str) {
        for _ in 0..100 {
            if sink.upload_count(job_id).await > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no upload for {job_id}");
    }

    #[tokio::test]
    async fn test_processes_until_channel_closes() {
        let f = Fixture::new();
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(f.worker().run(rx, CancellationToken::new()));

        tx.send(f.request("a.mp4").await).await.unwrap();
        tx.send(f.request("b.mp4").await).await.unwrap();
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.encodes_succeeded, 2);
        wait_for_upload(&f.sink, "a.mp4").await;
        wait_for_upload(&f.sink, "b.mp4").await;
    }

    #[tokio::test]
    async fn test_failed_encode_removes_input_and_continues() {
        let f = Fixture::new();
        f.transcoder
            .set_next_error(TranscoderError::encode_failed("bad input", None))
            .await;
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(f.worker().run(rx, CancellationToken::new()));

        let bad = f.request("bad.mp4").await;
        let bad_path = bad.local_path.clone();
        tx.send(bad).await.unwrap();
        tx.send(f.request("good.mp4").await).await.unwrap();
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.encodes_failed, 1);
        assert_eq!(stats.encodes_succeeded, 1);
        assert!(!bad_path.exists());
        assert!(f.store.contains("bad.mp4").await);
        wait_for_upload(&f.sink, "good.mp4").await;
        assert_eq!(f.sink.upload_count("bad.mp4").await, 0);
    }

    #[tokio::test]
    async fn test_cancel_drops_buffered_request() {
        let f = Fixture::new();
        f.transcoder.hold().await;
        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(f.worker().run(rx, cancel.clone()));

        tx.send(f.request("first.mp4").await).await.unwrap();
        while f.transcoder.started_count().await == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let buffered = f.request("second.mp4").await;
        let buffered_path = buffered.local_path.clone();
        tx.send(buffered).await.unwrap();

        cancel.cancel();
        f.transcoder.release_all().await;

        let stats = handle.await.unwrap();
        assert_eq!(stats.encodes_succeeded, 1);
        assert_eq!(stats.dropped_on_shutdown, 1);
        assert!(!buffered_path.exists());
        assert_eq!(f.transcoder.started_count().await, 1);
    }

    #[tokio::test]
    async fn test_request_sent_on_reserved_slot_after_cancel_is_dropped() {
        let f = Fixture::new();
        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        // A scan reserved the slot and is still downloading.
        let permit = tx.reserve().await.unwrap();
        let handle = tokio::spawn(f.worker().run(rx, cancel.clone()));
        cancel.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        let late = f.request("late.mp4").await;
        let late_path = late.local_path.clone();
        permit.send(late);

        let stats = handle.await.unwrap();
        assert_eq!(stats.dropped_on_shutdown, 1);
        assert_eq!(stats.encodes_succeeded, 0);
        assert!(!late_path.exists());
        assert_eq!(f.transcoder.started_count().await, 0);
    }
}
