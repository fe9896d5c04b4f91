//! Encode orchestrator implementation.
//!
//! One process runs three kinds of task:
//! - Scan loop: claims at most one job per tick (this task)
//! - Encode worker: one transcode at a time
//! - Completion tasks: detached, one per finished encode

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::job::HostIdentity;
use crate::lease::LeaseManager;
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;
use crate::store::{JobStore, OutputSink};
use crate::transcoder::Transcoder;
use crate::worker::{CompletionPipeline, EncodeWorker};

use super::config::OrchestratorConfig;
use super::types::{OrchestratorError, OrchestratorStatus};

/// Shared view of a running orchestrator's counters.
pub type StatusHandle = Arc<RwLock<OrchestratorStatus>>;

/// The encode orchestrator: scan loop, worker and shutdown release.
pub struct EncodeOrchestrator {
    config: OrchestratorConfig,
    leases: Arc<LeaseManager>,
    worker: EncodeWorker,
    completion: CompletionPipeline,
    shutdown: ShutdownCoordinator,
    status: StatusHandle,
}

impl EncodeOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn JobStore>,
        sink: Arc<dyn OutputSink>,
        transcoder: Arc<dyn Transcoder>,
        host: HostIdentity,
    ) -> Self {
        let leases = Arc::new(LeaseManager::new(
            Arc::clone(&store),
            host,
            config.lease_timeout,
            config.download_dir.clone(),
        ));
        let completion = CompletionPipeline::new(store, sink)
            .with_max_concurrent(config.max_concurrent_completions);
        let worker = EncodeWorker::new(transcoder, completion.clone());
        let shutdown = ShutdownCoordinator::new(Arc::clone(&leases), config.shutdown_grace);

        Self {
            config,
            leases,
            worker,
            completion,
            shutdown,
            status: Arc::new(RwLock::new(OrchestratorStatus::default())),
        }
    }

    /// Handle for reading status while [`run`](Self::run) is in progress.
    pub fn status_handle(&self) -> StatusHandle {
        Arc::clone(&self.status)
    }

    /// Runs until `cancel` fires, then releases leases, waits for the
    /// in-flight encode and drains the completions it started.
    ///
    /// Each tick first reserves the single channel slot, so a new job is only
    /// claimed once the worker has taken the previous one. At most one
    /// request is ever claimed but not yet started.
    pub async fn run(
        self,
        cancel: CancellationToken,
    ) -> Result<OrchestratorStatus, OrchestratorError> {
        let Self {
            config,
            leases,
            worker,
            completion,
            shutdown,
            status,
        } = self;

        let (tx, rx) = mpsc::channel(1);
        let worker_task = tokio::spawn(worker.run(rx, cancel.clone()));

        status.write().await.running = true;
        info!(
            host = %leases.host(),
            poll_interval_secs = config.poll_interval.as_secs_f64(),
            lease_timeout_secs = config.lease_timeout.as_secs(),
            "Encode orchestrator started"
        );

        let mut ticker = tokio::time::interval(config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = tx.reserve() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!("Encode worker stopped accepting requests");
                        break;
                    }
                },
            };

            let result = leases.acquire_one().await;
            let mut current = status.write().await;
            current.scans += 1;
            match result {
                Ok(Some(request)) => {
                    current.claims += 1;
                    metrics::LEASE_SCANS.with_label_values(&["claimed"]).inc();
                    permit.send(request);
                }
                Ok(None) => {
                    debug!("No available jobs");
                    metrics::LEASE_SCANS.with_label_values(&["idle"]).inc();
                }
                Err(e) => {
                    current.scan_errors += 1;
                    metrics::LEASE_SCANS.with_label_values(&["error"]).inc();
                    warn!(job_id = e.job_id().unwrap_or("-"), error = %e, "Lease scan failed");
                }
            }
        }

        info!("Scan loop stopped, closing worker intake");
        drop(tx);

        let released = match shutdown.release().await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(error = %e, "Leases not fully released; they will expire");
                None
            }
        };

        let worker_stats = worker_task.await?;
        let abandoned = completion.drain(config.completion_drain).await;

        let mut current = status.write().await;
        current.running = false;
        current.worker = worker_stats;
        current.released = released;
        current.completions_abandoned = abandoned;
        info!(
            scans = current.scans,
            claims = current.claims,
            encodes_succeeded = worker_stats.encodes_succeeded,
            encodes_failed = worker_stats.encodes_failed,
            "Encode orchestrator stopped"
        );

        Ok(current.clone())
    }
}
