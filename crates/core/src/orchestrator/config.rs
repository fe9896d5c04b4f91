//! Orchestrator configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::lease::LeaseConfig;

/// Runtime settings for the encode orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Period of the scan timer. The first scan runs immediately.
    pub poll_interval: Duration,
    /// Age after which a lease may be reclaimed.
    pub lease_timeout: Duration,
    /// Bound on the shutdown lease release.
    pub shutdown_grace: Duration,
    /// Bound on waiting for in-flight completions at shutdown.
    pub completion_drain: Duration,
    /// Where claimed sources are downloaded.
    pub download_dir: PathBuf,
    /// Cap on concurrent completion tasks.
    pub max_concurrent_completions: Option<usize>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&LeaseConfig::default())
    }
}

impl From<&LeaseConfig> for OrchestratorConfig {
    fn from(config: &LeaseConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            lease_timeout: Duration::from_secs(config.timeout_secs),
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
            completion_drain: Duration::from_secs(config.completion_drain_secs),
            download_dir: config.download_dir.clone(),
            max_concurrent_completions: config.max_concurrent_completions,
        }
    }
}
