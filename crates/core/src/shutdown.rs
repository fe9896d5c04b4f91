//! Signal handling and lease release on shutdown.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::lease::{LeaseManager, ReleaseSummary};

/// Errors from the shutdown release.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Release did not finish within the grace period. Unreleased leases
    /// expire on their own.
    #[error("lease release timed out after {0:?}")]
    Timeout(Duration),
}

/// Install a shutdown handler that listens for SIGTERM and SIGINT.
///
/// Returns a `CancellationToken` that is cancelled when either signal is
/// received. Must be called from within a Tokio runtime.
#[cfg(unix)]
pub fn install_shutdown_handler() -> std::io::Result<CancellationToken> {
    use tokio::signal::unix::{signal, SignalKind};

    let token = CancellationToken::new();
    let token_clone = token.clone();
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, initiating graceful shutdown");
            }
        }

        token_clone.cancel();
    });

    Ok(token)
}

/// Install a shutdown handler that listens for Ctrl-C.
#[cfg(not(unix))]
pub fn install_shutdown_handler() -> std::io::Result<CancellationToken> {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, initiating graceful shutdown");
        }
        token_clone.cancel();
    });

    Ok(token)
}

/// Releases this host's leases within a bounded grace period.
pub struct ShutdownCoordinator {
    leases: Arc<LeaseManager>,
    grace: Duration,
}

impl ShutdownCoordinator {
    pub fn new(leases: Arc<LeaseManager>, grace: Duration) -> Self {
        Self { leases, grace }
    }

    /// Removes the tags of every job owned by this host.
    ///
    /// Only this step has a deadline; on timeout the remaining leases are
    /// left to expire.
    pub async fn release(&self) -> Result<ReleaseSummary, ShutdownError> {
        info!(
            host = %self.leases.host(),
            grace_secs = self.grace.as_secs_f64(),
            "Releasing owned leases"
        );

        match tokio::time::timeout(self.grace, self.leases.release_owned()).await {
            Ok(summary) => {
                info!(
                    released = summary.released,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    "Lease release finished"
                );
                Ok(summary)
            }
            Err(_) => {
                warn!(grace_secs = self.grace.as_secs_f64(), "Lease release timed out");
                Err(ShutdownError::Timeout(self.grace))
            }
        }
    }
}
