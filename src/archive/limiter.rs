// src/archive/limiter.rs
// =============================================================================
// Paces every request we send to the archive.
//
// The Wayback Machine throttles (and eventually blocks) clients that hammer
// the CDX API, so every fetch in a run goes through one shared limiter.
// The limiter is a token bucket from the `governor` crate with a fixed
// requests-per-minute quota.
// =============================================================================

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovRateLimiter};
use std::num::NonZeroU32;

// The archive starts refusing connections somewhere above this rate.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 40;

/// Token-bucket limiter shared by all archive requests of one client.
pub struct RateLimiter {
    limiter: GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    requests_per_minute: u32,
}

impl RateLimiter {
    // Creates a limiter allowing `requests_per_minute` requests.
    // Zero falls back to DEFAULT_REQUESTS_PER_MINUTE.
    pub fn new(requests_per_minute: u32) -> Self {
        let rpm = NonZeroU32::new(requests_per_minute)
            .or(NonZeroU32::new(DEFAULT_REQUESTS_PER_MINUTE))
            .unwrap_or(NonZeroU32::MIN);

        Self {
            limiter: GovRateLimiter::direct(Quota::per_minute(rpm)),
            requests_per_minute: rpm.get(),
        }
    }

    /// Waits until a request slot is available.
    ///
    /// Safe to call from any number of tasks at once; there is no fairness
    /// guarantee between waiters, only a ceiling on the aggregate rate.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }
}
