//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Lease scans and claims
//! - Encodes (outcome and duration)
//! - Completion pipeline steps
//! - Shutdown lease release

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Leases
// =============================================================================

/// Lease scans by result.
pub static LEASE_SCANS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dashcoder_lease_scans_total", "Total lease scans"),
        &["result"], // "claimed", "idle", "error"
    )
    .expect("valid metric definition")
});

/// Jobs claimed by this process.
pub static JOBS_CLAIMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("dashcoder_jobs_claimed_total", "Total jobs claimed")
        .expect("valid metric definition")
});

/// Leases released during shutdown.
pub static LEASES_RELEASED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dashcoder_leases_released_total",
        "Total leases released on shutdown",
    )
    .expect("valid metric definition")
});

// =============================================================================
// Encoding
// =============================================================================

/// Encodes by result.
pub static ENCODES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dashcoder_encodes_total", "Total encodes"),
        &["result"], // "success", "failed"
    )
    .expect("valid metric definition")
});

/// Encode duration in seconds.
pub static ENCODE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "dashcoder_encode_duration_seconds",
            "Duration of one ffmpeg encode",
        )
        .buckets(vec![10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0]),
    )
    .expect("valid metric definition")
});

// =============================================================================
// Completion
// =============================================================================

/// Completion steps by step and result.
pub static COMPLETION_STEPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dashcoder_completion_steps_total",
            "Total completion pipeline steps",
        ),
        &["step", "result"], // step: "upload", "delete_source", "cleanup"
    )
    .expect("valid metric definition")
});

/// Completion tasks currently running.
pub static COMPLETIONS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dashcoder_completions_in_flight",
        "Number of completion tasks currently running",
    )
    .expect("valid metric definition")
});

// =============================================================================
// Helper functions
// =============================================================================

/// Records a completion step outcome.
pub fn record_step(step: &str, ok: bool) {
    COMPLETION_STEPS
        .with_label_values(&[step, if ok { "success" } else { "failed" }])
        .inc();
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(LEASE_SCANS.clone()),
        Box::new(JOBS_CLAIMED.clone()),
        Box::new(LEASES_RELEASED.clone()),
        Box::new(ENCODES_TOTAL.clone()),
        Box::new(ENCODE_DURATION.clone()),
        Box::new(COMPLETION_STEPS.clone()),
        Box::new(COMPLETIONS_IN_FLIGHT.clone()),
    ]
}
