// src/archive/mod.rs
// =============================================================================
// Talking to the Wayback Machine.
//
// Submodules:
// - client:  the three archive endpoints (index, snapshots, replay)
// - limiter: the shared requests-per-minute limiter
// - error:   typed failures, all of which the harvester treats as fail-soft
// =============================================================================

mod client;
mod error;
mod limiter;

pub use client::{
    ArchiveClient, ArchiveConfig, Snapshot, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS,
};
pub use error::{ArchiveError, FailureKind};
pub use limiter::DEFAULT_REQUESTS_PER_MINUTE;
