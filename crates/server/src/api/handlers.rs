use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use dashcoder_core::{OrchestratorStatus, SanitizedConfig};
use serde::Serialize;
use std::sync::Arc;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub host: String,
    pub version: String,
    pub orchestrator: OrchestratorStatus,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let orchestrator = state.status().await;
    let status = if orchestrator.running { "ok" } else { "stopped" };
    Json(HealthResponse {
        status: status.to_string(),
        host: state.host().to_string(),
        version: VERSION.to_string(),
        orchestrator,
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            format!("failed to encode metrics: {e}"),
        ),
    }
}
