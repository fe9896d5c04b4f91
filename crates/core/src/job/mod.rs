//! Source jobs, leases and encode requests.
//!
//! A job is an object in the source store. Ownership is recorded as two tags
//! on the object (`startAt`, `hostname`); there is no lock service and no
//! compare-and-swap, so two workers can claim the same expired lease at the
//! same time. Everything downstream of a claim is idempotent for that reason.

mod types;

pub use types::{
    EncodeRequest, HostIdentity, HostIdentityError, Lease, LeaseStatus, LeaseTagError, SourceJob,
    TAG_HOSTNAME, TAG_START_AT,
};
