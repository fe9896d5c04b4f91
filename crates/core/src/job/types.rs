//! Core job and lease data types.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tag key holding the RFC 3339 time a lease was acquired.
pub const TAG_START_AT: &str = "startAt";

/// Tag key holding the identity of the lease owner.
pub const TAG_HOSTNAME: &str = "hostname";

// ============================================================================
// Source Job
// ============================================================================

/// One uploaded source object, as observed in the source store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceJob {
    /// Object key in the source store. Stable for the job's lifetime.
    pub id: String,
    /// Tags attached to the stored object.
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl SourceJob {
    /// Create an untagged job.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tags: HashMap::new(),
        }
    }

    /// Create a job carrying the given tags.
    pub fn with_tags(id: impl Into<String>, tags: HashMap<String, String>) -> Self {
        Self {
            id: id.into(),
            tags,
        }
    }

    /// Owner recorded in the `hostname` tag, if any.
    pub fn lease_owner(&self) -> Option<&str> {
        self.tags.get(TAG_HOSTNAME).map(String::as_str)
    }

    /// Parse the lease recorded in this job's tags.
    pub fn lease(&self) -> Result<Option<Lease>, LeaseTagError> {
        Lease::from_tags(&self.tags)
    }
}

// ============================================================================
// Lease
// ============================================================================

/// Error parsing lease tags.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LeaseTagError {
    /// The `startAt` tag is not a zone-aware RFC 3339 timestamp.
    #[error("invalid startAt tag {value:?}: {reason}")]
    InvalidStartAt { value: String, reason: String },
}

/// A time-bounded claim of ownership, recorded as tags on a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// When the lease was acquired.
    pub started_at: DateTime<Utc>,
    /// Identity of the process holding the lease.
    pub owner: Option<String>,
}

impl Lease {
    /// A fresh lease for `owner` starting at `now`.
    pub fn new(owner: &HostIdentity, now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            owner: Some(owner.as_str().to_string()),
        }
    }

    /// Read a lease from object tags. No `startAt` tag means unclaimed.
    pub fn from_tags(tags: &HashMap<String, String>) -> Result<Option<Self>, LeaseTagError> {
        let Some(raw) = tags.get(TAG_START_AT) else {
            return Ok(None);
        };

        let started_at = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| LeaseTagError::InvalidStartAt {
                value: raw.clone(),
                reason: e.to_string(),
            })?
            .with_timezone(&Utc);

        Ok(Some(Self {
            started_at,
            owner: tags.get(TAG_HOSTNAME).cloned(),
        }))
    }

    /// Encode the lease as object tags.
    pub fn to_tags(&self) -> HashMap<String, String> {
        let mut tags = HashMap::new();
        tags.insert(
            TAG_START_AT.to_string(),
            self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        if let Some(owner) = &self.owner {
            tags.insert(TAG_HOSTNAME.to_string(), owner.clone());
        }
        tags
    }

    /// Whether `now` is strictly past `started_at + timeout`.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        let Ok(timeout) = chrono::Duration::from_std(timeout) else {
            return false;
        };
        match self.started_at.checked_add_signed(timeout) {
            Some(deadline) => now > deadline,
            None => false,
        }
    }

    /// Whether this lease is held by `host`.
    pub fn is_owned_by(&self, host: &HostIdentity) -> bool {
        self.owner.as_deref() == Some(host.as_str())
    }
}

/// How a job looks to a particular host at a particular instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseStatus {
    /// No lease recorded.
    Unclaimed,
    /// Live lease held by the observing host.
    HeldBySelf,
    /// Live lease held by some other process.
    HeldByOther { owner: Option<String> },
    /// Lease past its timeout (or unreadable); anyone may reclaim it.
    Expired { owner: Option<String> },
}

impl LeaseStatus {
    /// Classify `job` from the point of view of `host`.
    pub fn classify(
        job: &SourceJob,
        host: &HostIdentity,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Self {
        match job.lease() {
            Ok(None) => Self::Unclaimed,
            Ok(Some(lease)) if lease.is_expired(now, timeout) => {
                Self::Expired { owner: lease.owner }
            }
            Ok(Some(lease)) if lease.is_owned_by(host) => Self::HeldBySelf,
            Ok(Some(lease)) => Self::HeldByOther { owner: lease.owner },
            Err(e) => {
                tracing::warn!(
                    job_id = %job.id,
                    error = %e,
                    "Unreadable lease tags, treating as expired"
                );
                Self::Expired {
                    owner: job.lease_owner().map(str::to_string),
                }
            }
        }
    }

    /// Whether a scan may claim a job in this state.
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Unclaimed | Self::Expired { .. })
    }
}

// ============================================================================
// Encode Request
// ============================================================================

/// A claimed and downloaded job waiting for the encode worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeRequest {
    /// Echoes [`SourceJob::id`].
    pub job_id: String,
    /// Downloaded source content, owned by the worker until cleanup.
    pub local_path: PathBuf,
}

impl EncodeRequest {
    pub fn new(job_id: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            job_id: job_id.into(),
            local_path: local_path.into(),
        }
    }
}

// ============================================================================
// Host Identity
// ============================================================================

/// Error resolving the host identity.
#[derive(Debug, Error)]
pub enum HostIdentityError {
    /// Nothing usable was found in config, environment or OS.
    #[error("could not determine host identity")]
    Unresolved,
}

/// Identity attached to leases acquired by this process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostIdentity(String);

impl HostIdentity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    /// Resolve the identity once at startup.
    ///
    /// Order: explicit override, `HOSTNAME` environment variable, OS hostname.
    /// Blank values are skipped.
    pub fn resolve(override_identity: Option<&str>) -> Result<Self, HostIdentityError> {
        let from_env = std::env::var("HOSTNAME").ok();

        [override_identity.map(str::to_string), from_env, sysinfo::System::host_name()]
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
            .map(Self)
            .ok_or(HostIdentityError::Unresolved)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(name: &str) -> HostIdentity {
        HostIdentity::new(name)
    }

    fn tagged(id: &str, start_at: &str, owner: &str) -> SourceJob {
        let mut tags = HashMap::new();
        tags.insert(TAG_START_AT.to_string(), start_at.to_string());
        tags.insert(TAG_HOSTNAME.to_string(), owner.to_string());
        SourceJob::with_tags(id, tags)
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_untagged_job_is_unclaimed() {
        let job = SourceJob::new("m1");
        let status = LeaseStatus::classify(&job, &host("h1"), Utc::now(), HOUR);
        assert_eq!(status, LeaseStatus::Unclaimed);
        assert!(status.is_claimable());
    }

    #[test]
    fn test_lease_tags_roundtrip_keeps_owner() {
        let now = Utc::now();
        let lease = Lease::new(&host("h1"), now);
        let parsed = Lease::from_tags(&lease.to_tags()).unwrap().unwrap();
        assert_eq!(parsed.owner.as_deref(), Some("h1"));
        // Tags carry second precision.
        assert!(parsed.started_at <= now);
        assert!(now - parsed.started_at < chrono::Duration::seconds(1));
    }

    #[test]
    fn test_start_at_with_offset_is_zone_aware() {
        let job = tagged("m1", "2024-05-01T09:00:00+09:00", "h1");
        let lease = job.lease().unwrap().unwrap();
        assert_eq!(
            lease.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            "2024-05-01T00:00:00Z"
        );
    }

    #[test]
    fn test_live_lease_of_other_host_is_not_claimable() {
        let now = Utc::now();
        let job = tagged("m3", &now.to_rfc3339(), "h1");
        let status = LeaseStatus::classify(&job, &host("h2"), now, HOUR);
        assert_eq!(
            status,
            LeaseStatus::HeldByOther {
                owner: Some("h1".to_string())
            }
        );
        assert!(!status.is_claimable());
    }

    #[test]
    fn test_live_lease_of_self_is_not_claimable() {
        let now = Utc::now();
        let job = tagged("m3", &now.to_rfc3339(), "h1");
        let status = LeaseStatus::classify(&job, &host("h1"), now, HOUR);
        assert_eq!(status, LeaseStatus::HeldBySelf);
        assert!(!status.is_claimable());
    }

    #[test]
    fn test_expired_lease_is_claimable_by_anyone() {
        let now = Utc::now();
        let start = now - chrono::Duration::hours(2);
        let job = tagged("m2", &start.to_rfc3339(), "h1");

        for observer in ["h1", "h2"] {
            let status = LeaseStatus::classify(&job, &host(observer), now, HOUR);
            assert_eq!(
                status,
                LeaseStatus::Expired {
                    owner: Some("h1".to_string())
                }
            );
        }
    }

    #[test]
    fn test_lease_exactly_at_deadline_is_live() {
        let now = Utc::now();
        let lease = Lease {
            started_at: now - chrono::Duration::hours(1),
            owner: None,
        };
        assert!(!lease.is_expired(now, HOUR));
        assert!(lease.is_expired(now + chrono::Duration::milliseconds(1), HOUR));
    }

    #[test]
    fn test_malformed_start_at_is_reclaimable() {
        let job = tagged("m9", "yesterday", "h1");
        assert!(matches!(
            job.lease(),
            Err(LeaseTagError::InvalidStartAt { .. })
        ));
        let status = LeaseStatus::classify(&job, &host("h2"), Utc::now(), HOUR);
        assert!(status.is_claimable());
    }

    #[test]
    fn test_host_identity_override_wins() {
        let id = HostIdentity::resolve(Some("worker-7")).unwrap();
        assert_eq!(id.as_str(), "worker-7");
        assert_eq!(id.to_string(), "worker-7");
    }

    #[test]
    fn test_host_identity_blank_override_is_skipped() {
        // Falls through to environment / OS; either way never blank.
        if let Ok(id) = HostIdentity::resolve(Some("   ")) {
            assert!(!id.as_str().trim().is_empty());
        }
    }
}
