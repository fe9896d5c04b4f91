use dashcoder_core::{Config, HostIdentity, OrchestratorStatus, SanitizedConfig, StatusHandle};

/// Shared application state
pub struct AppState {
    config: Config,
    host: HostIdentity,
    status: StatusHandle,
}

impl AppState {
    pub fn new(config: Config, host: HostIdentity, status: StatusHandle) -> Self {
        Self {
            config,
            host,
            status,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn host(&self) -> &HostIdentity {
        &self.host
    }

    /// Snapshot of the orchestrator counters.
    pub async fn status(&self) -> OrchestratorStatus {
        self.status.read().await.clone()
    }
}
