//! Configuration for leasing and the scan loop.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lease timing and local staging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// A lease older than this may be reclaimed by any worker.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Seconds between scans of the source store.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Upper bound on the shutdown lease release.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Upper bound on waiting for in-flight uploads at shutdown.
    #[serde(default = "default_completion_drain_secs")]
    pub completion_drain_secs: u64,

    /// Where claimed sources are downloaded.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Cap on concurrent completion tasks. Unset means unbounded.
    #[serde(default)]
    pub max_concurrent_completions: Option<usize>,
}

fn default_timeout_secs() -> u64 {
    3600
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

fn default_completion_drain_secs() -> u64 {
    600
}

fn default_download_dir() -> PathBuf {
    std::env::temp_dir()
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            completion_drain_secs: default_completion_drain_secs(),
            download_dir: default_download_dir(),
            max_concurrent_completions: None,
        }
    }
}
