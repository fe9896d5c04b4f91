//! Encode orchestrator: the per-process control loop.
//!
//! - **Scan**: one claim per tick, gated on the worker accepting the previous
//!   request
//! - **Encode**: sequential, one job at a time (handled by `EncodeWorker`)
//! - **Complete**: detached upload and cleanup (handled by `CompletionPipeline`)

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::{EncodeOrchestrator, StatusHandle};
pub use types::{OrchestratorError, OrchestratorStatus};
