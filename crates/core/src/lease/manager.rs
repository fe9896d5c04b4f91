//! Lease manager: claim one job per scan, release owned jobs on shutdown.

use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::error::LeaseError;
use crate::job::{EncodeRequest, HostIdentity, Lease, LeaseStatus};
use crate::metrics;
use crate::store::{JobStore, StoreError};

/// Prefix of downloaded source files in the download dir.
pub const DOWNLOAD_PREFIX: &str = "dashcoder-src-";

/// Outcome of releasing this host's leases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseSummary {
    /// Leases removed.
    pub released: usize,
    /// Jobs left alone (untagged or owned by another host).
    pub skipped: usize,
    /// Listing items or tag removals that failed.
    pub failed: usize,
}

/// Claims and releases job leases on behalf of one host.
pub struct LeaseManager {
    store: Arc<dyn JobStore>,
    host: HostIdentity,
    lease_timeout: Duration,
    download_dir: PathBuf,
}

impl LeaseManager {
    pub fn new(
        store: Arc<dyn JobStore>,
        host: HostIdentity,
        lease_timeout: Duration,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            host,
            lease_timeout,
            download_dir,
        }
    }

    pub fn host(&self) -> &HostIdentity {
        &self.host
    }

    pub fn lease_timeout(&self) -> Duration {
        self.lease_timeout
    }

    /// Scans the source store and claims the first available job.
    ///
    /// The lease tag is written before the download starts, so a failed
    /// download leaves a tag that simply expires. At most one job is claimed
    /// per call.
    pub async fn acquire_one(&self) -> Result<Option<EncodeRequest>, LeaseError> {
        let now = Utc::now();
        let mut jobs = self.store.list_jobs();

        while let Some(job) = jobs.next().await {
            let job = job.map_err(LeaseError::List)?;

            let status = LeaseStatus::classify(&job, &self.host, now, self.lease_timeout);
            match &status {
                LeaseStatus::Unclaimed => {}
                LeaseStatus::Expired { owner } => {
                    info!(
                        job_id = %job.id,
                        previous_owner = owner.as_deref().unwrap_or("unknown"),
                        "Reclaiming expired lease"
                    );
                }
                LeaseStatus::HeldBySelf | LeaseStatus::HeldByOther { .. } => {
                    debug!(job_id = %job.id, ?status, "Skipping leased job");
                    continue;
                }
            }

            let lease = Lease::new(&self.host, Utc::now());
            self.store
                .set_tags(&job.id, lease.to_tags())
                .await
                .map_err(|source| LeaseError::Tag {
                    job_id: job.id.clone(),
                    source,
                })?;

            info!(job_id = %job.id, host = %self.host, "Claimed job");
            metrics::JOBS_CLAIMED.inc();

            let local_path = self.download(&job.id).await?;
            return Ok(Some(EncodeRequest::new(job.id, local_path)));
        }

        Ok(None)
    }

    async fn download(&self, job_id: &str) -> Result<PathBuf, LeaseError> {
        let local_err = |source| LeaseError::LocalFile {
            job_id: job_id.to_string(),
            source,
        };

        let mut reader = self
            .store
            .get_content(job_id)
            .await
            .map_err(|source| LeaseError::Download {
                job_id: job_id.to_string(),
                source,
            })?;

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(local_err)?;
        let (file, path) = tempfile::Builder::new()
            .prefix(DOWNLOAD_PREFIX)
            .tempfile_in(&self.download_dir)
            .and_then(|f| f.keep().map_err(|e| e.error))
            .map_err(local_err)?;
        let mut file = tokio::fs::File::from_std(file);

        let copied = async {
            let bytes = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            Ok::<u64, std::io::Error>(bytes)
        }
        .await;

        match copied {
            Ok(bytes) => {
                debug!(job_id = %job_id, path = %path.display(), bytes, "Downloaded source");
                Ok(path)
            }
            Err(e) => {
                drop(file);
                remove_partial(&path).await;
                Err(LeaseError::Download {
                    job_id: job_id.to_string(),
                    source: StoreError::download_failed(job_id, e),
                })
            }
        }
    }

    /// Removes the lease tags of every job this host owns.
    ///
    /// Failures are logged and counted; the scan always runs to the end.
    pub async fn release_owned(&self) -> ReleaseSummary {
        let mut summary = ReleaseSummary::default();
        let mut jobs = self.store.list_jobs();

        while let Some(item) = jobs.next().await {
            let job = match item {
                Ok(job) => job,
                Err(e) => {
                    warn!(error = %e, "Failed to list job during release");
                    summary.failed += 1;
                    continue;
                }
            };

            if job.lease_owner() != Some(self.host.as_str()) {
                summary.skipped += 1;
                continue;
            }

            match self.store.remove_tags(&job.id).await {
                Ok(()) => {
                    info!(job_id = %job.id, "Released lease");
                    metrics::LEASES_RELEASED.inc();
                    summary.released += 1;
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Failed to release lease");
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove partial download");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{TAG_HOSTNAME, TAG_START_AT};
    use crate::testing::fixtures::{lease_tags, raw_lease_tags};
    use crate::testing::{MockJobStore, StoreCall, StoreOperation};
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn manager(store: &MockJobStore, host: &str, dir: &TempDir) -> LeaseManager {
        LeaseManager::new(
            Arc::new(store.clone()),
            HostIdentity::new(host),
            HOUR,
            dir.path().to_path_buf(),
        )
    }

    #[tokio::test]
    async fn test_claims_untagged_job() {
        let dir = TempDir::new().unwrap();
        let store = MockJobStore::new();
        store.insert("movie.mp4", b"media bytes").await;

        let before = Utc::now();
        let request = manager(&store, "worker-a", &dir)
            .acquire_one()
            .await
            .unwrap()
            .unwrap();

        assert_eq!(request.job_id, "movie.mp4");
        assert_eq!(std::fs::read(&request.local_path).unwrap(), b"media bytes");
        assert!(request.local_path.starts_with(dir.path()));

        let tags = store.tags("movie.mp4").await.unwrap();
        assert_eq!(tags.get(TAG_HOSTNAME).map(String::as_str), Some("worker-a"));
        let lease = Lease::from_tags(&tags).unwrap().unwrap();
        assert!(lease.started_at >= before - ChronoDuration::seconds(1));
        assert!(lease.started_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let dir = TempDir::new().unwrap();
        let store = MockJobStore::new();
        store
            .insert_tagged("a.mp4", b"x", lease_tags("worker-b", Utc::now()))
            .await;

        let result = manager(&store, "worker-a", &dir).acquire_one().await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_skips_live_lease_of_other_host() {
        let dir = TempDir::new().unwrap();
        let store = MockJobStore::new();
        let fresh = lease_tags("worker-b", Utc::now() - ChronoDuration::minutes(5));
        store.insert_tagged("a.mp4", b"x", fresh.clone()).await;
        store.insert("b.mp4", b"y").await;

        let request = manager(&store, "worker-a", &dir)
            .acquire_one()
            .await
            .unwrap()
            .unwrap();

        assert_eq!(request.job_id, "b.mp4");
        assert_eq!(store.tags("a.mp4").await.unwrap(), fresh);
    }

    #[tokio::test]
    async fn test_skips_live_lease_of_self() {
        let dir = TempDir::new().unwrap();
        let store = MockJobStore::new();
        store
            .insert_tagged("a.mp4", b"x", lease_tags("worker-a", Utc::now()))
            .await;

        let result = manager(&store, "worker-a", &dir).acquire_one().await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_reclaims_expired_lease() {
        let dir = TempDir::new().unwrap();
        let store = MockJobStore::new();
        let stale = lease_tags("worker-b", Utc::now() - ChronoDuration::hours(2));
        store.insert_tagged("a.mp4", b"x", stale).await;

        let request = manager(&store, "worker-a", &dir)
            .acquire_one()
            .await
            .unwrap()
            .unwrap();

        assert_eq!(request.job_id, "a.mp4");
        let tags = store.tags("a.mp4").await.unwrap();
        assert_eq!(tags.get(TAG_HOSTNAME).map(String::as_str), Some("worker-a"));
    }

    #[tokio::test]
    async fn test_reclaims_malformed_lease() {
        let dir = TempDir::new().unwrap();
        let store = MockJobStore::new();
        store
            .insert_tagged("a.mp4", b"x", raw_lease_tags("worker-b", "yesterday-ish"))
            .await;

        let request = manager(&store, "worker-a", &dir).acquire_one().await.unwrap();
        assert!(request.is_some());
    }

    #[tokio::test]
    async fn test_one_claim_per_scan() {
        let dir = TempDir::new().unwrap();
        let store = MockJobStore::new();
        store.insert("a.mp4", b"1").await;
        store.insert("b.mp4", b"2").await;

        let leases = manager(&store, "worker-a", &dir);
        let first = leases.acquire_one().await.unwrap().unwrap();
        assert_eq!(first.job_id, "a.mp4");
        assert!(store.tags("b.mp4").await.unwrap().is_empty());

        let second = leases.acquire_one().await.unwrap().unwrap();
        assert_eq!(second.job_id, "b.mp4");
        assert!(leases.acquire_one().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tag_written_before_download() {
        let dir = TempDir::new().unwrap();
        let store = MockJobStore::new();
        store.insert("a.mp4", b"x").await;

        manager(&store, "worker-a", &dir).acquire_one().await.unwrap();

        let calls = store.recorded_calls().await;
        let tag_at = calls
            .iter()
            .position(|c| matches!(c, StoreCall::SetTags { .. }))
            .unwrap();
        let get_at = calls
            .iter()
            .position(|c| matches!(c, StoreCall::GetContent { .. }))
            .unwrap();
        assert!(tag_at < get_at);
    }

    #[tokio::test]
    async fn test_failed_download_keeps_tag_and_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let store = MockJobStore::new();
        store.insert("a.mp4", b"0123456789").await;
        store.break_reads("a.mp4").await;

        let result = manager(&store, "worker-a", &dir).acquire_one().await;
        assert!(matches!(result, Err(LeaseError::Download { .. })));

        let tags = store.tags("a.mp4").await.unwrap();
        assert!(tags.contains_key(TAG_START_AT));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_tagging_failure_skips_download() {
        let dir = TempDir::new().unwrap();
        let store = MockJobStore::new();
        store.insert("a.mp4", b"x").await;
        store
            .set_next_error(
                StoreOperation::SetTags,
                StoreError::tagging_failed("a.mp4", "denied"),
            )
            .await;

        let result = manager(&store, "worker-a", &dir).acquire_one().await;
        assert!(matches!(result, Err(LeaseError::Tag { .. })));
        assert!(!store
            .recorded_calls()
            .await
            .iter()
            .any(|c| matches!(c, StoreCall::GetContent { .. })));
    }

    #[tokio::test]
    async fn test_listing_failure_is_returned() {
        let dir = TempDir::new().unwrap();
        let store = MockJobStore::new();
        store
            .set_next_error(StoreOperation::List, StoreError::ListFailed("down".into()))
            .await;

        let result = manager(&store, "worker-a", &dir).acquire_one().await;
        assert!(matches!(result, Err(LeaseError::List(_))));
    }

    #[tokio::test]
    async fn test_release_only_touches_own_leases() {
        let dir = TempDir::new().unwrap();
        let store = MockJobStore::new();
        let foreign = lease_tags("worker-b", Utc::now());
        store
            .insert_tagged("mine-1.mp4", b"x", lease_tags("worker-a", Utc::now()))
            .await;
        store
            .insert_tagged(
                "mine-2.mp4",
                b"x",
                lease_tags("worker-a", Utc::now() - ChronoDuration::hours(3)),
            )
            .await;
        store.insert_tagged("theirs.mp4", b"x", foreign.clone()).await;
        store.insert("free.mp4", b"x").await;

        let summary = manager(&store, "worker-a", &dir).release_owned().await;

        assert_eq!(
            summary,
            ReleaseSummary {
                released: 2,
                skipped: 2,
                failed: 0
            }
        );
        assert!(store.tags("mine-1.mp4").await.unwrap().is_empty());
        assert!(store.tags("mine-2.mp4").await.unwrap().is_empty());
        assert_eq!(store.tags("theirs.mp4").await.unwrap(), foreign);
    }

    #[tokio::test]
    async fn test_release_counts_failures_and_continues() {
        let dir = TempDir::new().unwrap();
        let store = MockJobStore::new();
        store
            .insert_tagged("a.mp4", b"x", lease_tags("worker-a", Utc::now()))
            .await;
        store
            .insert_tagged("b.mp4", b"x", lease_tags("worker-a", Utc::now()))
            .await;
        store
            .set_next_error(
                StoreOperation::RemoveTags,
                StoreError::tagging_failed("a.mp4", "denied"),
            )
            .await;

        let summary = manager(&store, "worker-a", &dir).release_owned().await;
        assert_eq!(summary.released, 1);
        assert_eq!(summary.failed, 1);
        assert!(store.tags("b.mp4").await.unwrap().is_empty());
    }
}
