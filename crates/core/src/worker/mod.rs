//! Encode worker and completion pipeline.
//!
//! The worker runs exactly one encode at a time. Each finished encode is
//! handed to a detached completion task so the worker can take the next
//! request immediately.

mod completion;
mod encoder;

pub use completion::{CompletionPipeline, CompletionReport};
pub use encoder::{EncodeWorker, WorkerStats};
