//! Prometheus metrics for the operations endpoint.
//!
//! HTTP request counters live here; lease, encode and completion metrics
//! come from `dashcoder_core::metrics` and are registered alongside.

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "dashcoder_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["method", "path", "status"],
    )
    .expect("valid metric definition")
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dashcoder_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("valid metric definition")
});

// =============================================================================
// Orchestrator (collected dynamically)
// =============================================================================

/// Scan loop running state (1 = running, 0 = stopped).
pub static ORCHESTRATOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dashcoder_orchestrator_running",
        "Whether the scan loop is running (1) or stopped (0)",
    )
    .expect("valid metric definition")
});

fn register_metrics(registry: &Registry) {
    let local: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(ORCHESTRATOR_RUNNING.clone()),
    ];

    for metric in local.into_iter().chain(dashcoder_core::metrics::all_metrics()) {
        if let Err(e) = registry.register(metric) {
            tracing::warn!(error = %e, "Failed to register metric");
        }
    }
}

/// Update gauges from the current orchestrator status.
pub async fn collect_dynamic_metrics(state: &AppState) {
    let status = state.status().await;
    ORCHESTRATOR_RUNNING.set(i64::from(status.running));
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
