// src/harvest/expand.rs
// =============================================================================
// Robots and source expanders.
//
// Given one URL, an expander:
// 1. lists the URL's distinct archived captures (snapshot enumerator)
// 2. fetches each capture's raw body, one after another (content fetcher)
// 3. runs the matching extractor over every body
//
// Everything is a lazy Stream: nothing is fetched until the dispatcher
// polls, and a dispatcher that stops polling (consumer gone, run cancelled)
// stops the fetching too. A failed snapshot is counted and skipped; the
// remaining snapshots are still fetched.
// =============================================================================

use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::stats::HarvestStats;
use crate::archive::{ArchiveClient, Snapshot};
use crate::extract::{extract_robots_urls, extract_source_urls};

pub struct Expander {
    archive: Arc<ArchiveClient>,
    stats: Arc<HarvestStats>,
    cancel: CancellationToken,
}

impl Expander {
    pub fn new(
        archive: Arc<ArchiveClient>,
        stats: Arc<HarvestStats>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            archive,
            stats,
            cancel,
        }
    }

    /// Candidate URLs from every archived version of a robots.txt file.
    pub fn robots<'a>(&'a self, robots_url: &'a str) -> BoxStream<'a, String> {
        self.archived_bodies(robots_url)
            .flat_map(|(snapshot, body)| {
                stream::iter(extract_robots_urls(&body, &snapshot.original))
            })
            .filter(unique())
            .boxed()
    }

    /// Candidate URLs on `root_domain` from every archived version of a page.
    pub fn source<'a>(&'a self, page_url: &'a str, root_domain: &'a str) -> BoxStream<'a, String> {
        self.archived_bodies(page_url)
            .flat_map(move |(snapshot, body)| {
                stream::iter(extract_source_urls(&body, &snapshot.original, root_domain))
            })
            .filter(unique())
            .boxed()
    }

    // Non-empty bodies of every snapshot that could be fetched.
    fn archived_bodies<'a>(
        &'a self,
        url: &'a str,
    ) -> impl Stream<Item = (Snapshot, String)> + Send + 'a {
        stream::once(self.snapshots(url))
            .flat_map(stream::iter)
            .filter_map(move |snapshot| self.body(snapshot))
            .take_until(self.cancel.cancelled())
    }

    async fn snapshots(&self, url: &str) -> Vec<Snapshot> {
        match self.archive.snapshots(url, &self.cancel).await {
            Ok(snapshots) => {
                debug!(url, count = snapshots.len(), "snapshots listed");
                snapshots
            }
            Err(e) => {
                debug!(url, error = %e, "snapshot listing failed");
                self.stats.failure(&e);
                Vec::new()
            }
        }
    }

    async fn body(&self, snapshot: Snapshot) -> Option<(Snapshot, String)> {
        match self.archive.content(&snapshot, &self.cancel).await {
            Ok(body) if body.is_empty() => None,
            Ok(body) => Some((snapshot, body)),
            Err(e) => {
                debug!(
                    url = %snapshot.original,
                    timestamp = %snapshot.timestamp,
                    error = %e,
                    "snapshot skipped"
                );
                self.stats.failure(&e);
                None
            }
        }
    }
}

// Stream filter that lets each URL through once. Different captures of the
// same file mostly repeat each other.
fn unique() -> impl FnMut(&String) -> future::Ready<bool> {
    let mut seen = HashSet::new();
    move |url| future::ready(seen.insert(url.clone()))
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is a BoxStream?
//    - `robots` and `source` build different stream types under the hood
//    - `.boxed()` puts each one behind a pointer with one common type
//    - The dispatcher can then hold either in the same variable
//
// 2. What do the 'a lifetimes mean here?
//    - The returned stream borrows the Expander and the URL strings
//    - 'a says the stream cannot outlive what it borrows
//    - No cloning is needed because the worker awaits the stream in place
//
// 3. Why stream::once(...).flat_map(stream::iter)?
//    - `snapshots()` is one async call that returns a Vec
//    - `stream::once` turns that future into a one-item stream
//    - `flat_map(stream::iter)` then spreads the Vec out into single items
//
// 4. What does take_until do?
//    - It ends the stream as soon as the given future completes
//    - Here that future is `cancel.cancelled()`, so cancelling stops fetching
// -----------------------------------------------------------------------------
