//! Operations surface for a dashcoder worker: health, sanitized config and
//! Prometheus metrics.

pub mod api;
pub mod metrics;
pub mod state;
