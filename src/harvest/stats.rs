// src/harvest/stats.rs
// =============================================================================
// Diagnostics side-channel for a harvest run.
//
// The record stream never carries errors: a failed fetch just means fewer
// records. These counters are how a caller finds out *why* a run came back
// thin (the archive was down, captures were unavailable, ...).
//
// Plain atomics: they are bumped from many worker tasks at once and only
// ever read as a point-in-time snapshot.
// =============================================================================

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::archive::{ArchiveError, FailureKind};

#[derive(Debug, Default)]
pub struct HarvestStats {
    indexed: AtomicUsize,
    dispatched: AtomicUsize,
    out_of_scope: AtomicUsize,
    records: AtomicUsize,
    expansions: AtomicUsize,
    transport_failures: AtomicUsize,
    status_failures: AtomicUsize,
    malformed_responses: AtomicUsize,
    captures_unavailable: AtomicUsize,
    cancelled: AtomicUsize,
}

/// Point-in-time copy of HarvestStats, for printing or serializing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub indexed: usize,
    pub dispatched: usize,
    pub out_of_scope: usize,
    pub records: usize,
    pub expansions: usize,
    pub transport_failures: usize,
    pub status_failures: usize,
    pub malformed_responses: usize,
    pub captures_unavailable: usize,
    pub cancelled: usize,
}

impl StatsSnapshot {
    pub fn failures(&self) -> usize {
        self.transport_failures
            + self.status_failures
            + self.malformed_responses
            + self.captures_unavailable
    }
}

impl HarvestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indexed(&self, count: usize) {
        self.indexed.fetch_add(count, Ordering::Relaxed);
    }

    // One index URL handed to the work queue.
    pub fn dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn out_of_scope(&self) {
        self.out_of_scope.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emitted(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn expansion_started(&self) {
        self.expansions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure(&self, error: &ArchiveError) {
        let counter = match error.kind() {
            FailureKind::Transport => &self.transport_failures,
            FailureKind::Status => &self.status_failures,
            FailureKind::Malformed => &self.malformed_responses,
            FailureKind::CaptureUnavailable => &self.captures_unavailable,
            FailureKind::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            indexed: self.indexed.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            out_of_scope: self.out_of_scope.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            expansions: self.expansions.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            status_failures: self.status_failures.load(Ordering::Relaxed),
            malformed_responses: self.malformed_responses.load(Ordering::Relaxed),
            captures_unavailable: self.captures_unavailable.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}
