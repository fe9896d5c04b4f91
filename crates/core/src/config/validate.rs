use super::{types::Config, ConfigError};

/// Longest accepted lease timeout, ten years. Larger values cannot be added
/// to a lease start time, so such leases would never expire.
pub const MAX_LEASE_TIMEOUT_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Validate configuration
/// Currently validates:
/// - Lease timeout, poll interval, shutdown grace and completion drain are not 0
/// - Lease timeout is at most ten years
/// - Completion cap, if set, is not 0
/// - Buckets are named and distinct
/// - Transcoder produces at least one representation at a real frame rate
/// - Server port is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let fail = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    // Lease validation
    if config.lease.timeout_secs == 0 {
        return fail("lease.timeout_secs cannot be 0");
    }
    if config.lease.timeout_secs > MAX_LEASE_TIMEOUT_SECS {
        return Err(ConfigError::ValidationError(format!(
            "lease.timeout_secs cannot exceed {MAX_LEASE_TIMEOUT_SECS}"
        )));
    }
    if config.lease.poll_interval_secs == 0 {
        return fail("lease.poll_interval_secs cannot be 0");
    }
    if config.lease.shutdown_grace_secs == 0 {
        return fail("lease.shutdown_grace_secs cannot be 0");
    }
    if config.lease.completion_drain_secs == 0 {
        return fail("lease.completion_drain_secs cannot be 0");
    }
    if config.lease.max_concurrent_completions == Some(0) {
        return fail("lease.max_concurrent_completions cannot be 0");
    }

    // Storage validation
    let storage = &config.storage;
    if storage.source_bucket.trim().is_empty() {
        return fail("storage.source_bucket cannot be empty");
    }
    if storage.output_bucket.trim().is_empty() {
        return fail("storage.output_bucket cannot be empty");
    }
    if storage.source_bucket == storage.output_bucket {
        return fail("storage.source_bucket and storage.output_bucket must differ");
    }

    // Transcoder validation
    if config.transcoder.fps == 0 {
        return fail("transcoder.fps cannot be 0");
    }
    if config.transcoder.segment_secs == 0 {
        return fail("transcoder.segment_secs cannot be 0");
    }
    if config.transcoder.qualities.is_empty() {
        return fail("transcoder.qualities cannot be empty");
    }

    // Server validation
    if config.server.port == 0 {
        return fail("server.port cannot be 0");
    }

    Ok(())
}
