//! Types for the encode orchestrator.

use serde::Serialize;
use thiserror::Error;

use crate::lease::ReleaseSummary;
use crate::worker::WorkerStats;

/// Errors that end an orchestrator run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The worker task panicked or was aborted.
    #[error("encode worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorStatus {
    /// Whether the scan loop is running.
    pub running: bool,
    /// Scans performed.
    pub scans: usize,
    /// Jobs claimed and handed to the worker.
    pub claims: usize,
    /// Scans that ended in an error.
    pub scan_errors: usize,
    /// Encoder counters, filled in when the worker stops.
    pub worker: WorkerStats,
    /// Shutdown release outcome. `None` if it timed out or has not run.
    pub released: Option<ReleaseSummary>,
    /// Completions still running when the shutdown drain gave up.
    pub completions_abandoned: usize,
}
