// src/harvest/dispatch.rs
// =============================================================================
// The harvest pipeline.
//
// How a run works:
// 1. A producer task asks the archive index for every URL of the domain and
//    pushes them into a bounded work queue (it waits when the queue is full).
// 2. A worker pool pulls URLs off the queue, `concurrency` at a time. For
//    each URL a worker:
//      - drops it if it is out of scope
//      - emits it as a `wayback` record
//      - optionally expands it (robots.txt or page source) and emits every
//        in-scope URL the expander finds
// 3. Once the queue is drained and every worker is done, the output
//    channel's last sender is dropped and the record stream ends.
//
// Nothing in here returns an error. A failed fetch is logged, counted in
// HarvestStats and simply produces fewer records.
//
// Cancellation: the token passed to `run` stops the producer, stops workers
// from taking new URLs, aborts in-flight archive requests and unblocks any
// worker waiting to emit. The record stream then closes whether or not
// anyone is still reading it.
// =============================================================================

use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::expand::Expander;
use super::record::{Expansion, UrlRecord};
use super::scope::{is_media_url, is_robots_url, ScopeSpec};
use super::stats::HarvestStats;
use crate::archive::{ArchiveClient, ArchiveConfig};

pub const DEFAULT_CONCURRENCY: usize = 20;

// Work queue and output channel hold this many items per worker.
const QUEUE_MULTIPLIER: usize = 4;

// Upper bound on either channel, whatever --concurrency says.
const MAX_QUEUE_CAPACITY: usize = 4096;

fn queue_capacity(concurrency: usize) -> usize {
    concurrency
        .saturating_mul(QUEUE_MULTIPLIER)
        .clamp(1, MAX_QUEUE_CAPACITY)
}

/// What a single run should do. Read-only once the run starts.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub include_subdomains: bool,
    pub parse_robots: bool,
    pub parse_source: bool,
    pub concurrency: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            include_subdomains: false,
            parse_robots: false,
            parse_source: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl HarvestConfig {
    fn expands(&self) -> bool {
        self.parse_robots || self.parse_source
    }
}

pub struct Harvester {
    archive: Arc<ArchiveClient>,
    config: HarvestConfig,
    stats: Arc<HarvestStats>,
}

impl Harvester {
    pub fn new(archive: &ArchiveConfig, config: HarvestConfig) -> anyhow::Result<Self> {
        Ok(Self::with_client(ArchiveClient::new(archive)?, config))
    }

    pub fn with_client(archive: ArchiveClient, config: HarvestConfig) -> Self {
        Self {
            archive: Arc::new(archive),
            config,
            stats: Arc::new(HarvestStats::new()),
        }
    }

    /// Counters for every run started by this harvester.
    pub fn stats(&self) -> Arc<HarvestStats> {
        self.stats.clone()
    }

    /// Starts harvesting `domain` and returns the stream of records.
    ///
    /// Must be called from inside a tokio runtime. Records arrive in
    /// completion order. The stream ends when every URL has been processed,
    /// or shortly after `cancel` fires. Dropping the stream also stops the
    /// run, once workers notice their sends failing.
    pub fn run(&self, domain: &str, cancel: CancellationToken) -> ReceiverStream<UrlRecord> {
        let concurrency = self.config.concurrency.max(1);
        let capacity = queue_capacity(concurrency);
        let (work_tx, work_rx) = mpsc::channel(capacity);
        let (records_tx, records_rx) = mpsc::channel(capacity);

        let scope = ScopeSpec::new(domain, self.config.include_subdomains);
        info!(
            domain = scope.root_domain(),
            include_subdomains = self.config.include_subdomains,
            parse_robots = self.config.parse_robots,
            parse_source = self.config.parse_source,
            concurrency,
            "harvest started"
        );

        tokio::spawn(produce(
            self.archive.clone(),
            self.stats.clone(),
            scope.root_domain().to_string(),
            self.config.include_subdomains,
            work_tx,
            cancel.clone(),
        ));

        let worker = Arc::new(Worker {
            expander: Expander::new(self.archive.clone(), self.stats.clone(), cancel.clone()),
            scope,
            config: self.config.clone(),
            stats: self.stats.clone(),
            records: records_tx,
            cancel: cancel.clone(),
        });

        let stats = self.stats.clone();
        tokio::spawn(async move {
            ReceiverStream::new(work_rx)
                .take_until(cancel.cancelled())
                .for_each_concurrent(concurrency, |url| {
                    let worker = worker.clone();
                    async move { worker.process(url).await }
                })
                .await;

            let summary = stats.snapshot();
            info!(
                records = summary.records,
                failures = summary.failures(),
                cancelled = cancel.is_cancelled(),
                "harvest finished"
            );
            // `worker` holds the last records sender; dropping it here ends
            // the output stream.
        });

        ReceiverStream::new(records_rx)
    }
}

// Tier 1: fetch the index and feed the work queue.
async fn produce(
    archive: Arc<ArchiveClient>,
    stats: Arc<HarvestStats>,
    domain: String,
    include_subdomains: bool,
    work: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    let urls = match archive.urls(&domain, include_subdomains, &cancel).await {
        Ok(urls) => urls,
        Err(e) => {
            warn!(domain = %domain, error = %e, "index query failed");
            stats.failure(&e);
            return;
        }
    };

    stats.indexed(urls.len());
    info!(domain = %domain, count = urls.len(), "index fetched");

    for url in urls {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            sent = work.send(url) => {
                if sent.is_err() {
                    return;
                }
                stats.dispatched();
            }
        }
    }
}

// Everything a tier-2 unit needs, shared by all of them.
struct Worker {
    expander: Expander,
    scope: ScopeSpec,
    config: HarvestConfig,
    stats: Arc<HarvestStats>,
    records: mpsc::Sender<UrlRecord>,
    cancel: CancellationToken,
}

impl Worker {
    async fn process(&self, url: String) {
        if !self.scope.contains(&url) {
            debug!(url = %url, "out of scope");
            self.stats.out_of_scope();
            return;
        }

        if !self.emit(UrlRecord::indexed(url.clone())).await {
            return;
        }

        if !self.config.expands() || is_media_url(&url) {
            return;
        }

        let robots = is_robots_url(&url);
        let (expansion, mut candidates) = if robots && self.config.parse_robots {
            (Expansion::Robots, self.expander.robots(&url))
        } else if !robots && self.config.parse_source {
            (
                Expansion::Source,
                self.expander.source(&url, self.scope.root_domain()),
            )
        } else {
            return;
        };

        self.stats.expansion_started();
        debug!(url = %url, ?expansion, "expanding");

        while let Some(candidate) = candidates.next().await {
            if !self.scope.contains(&candidate) {
                self.stats.out_of_scope();
                continue;
            }

            if !self.emit(UrlRecord::expanded(expansion, candidate)).await {
                return;
            }
        }
    }

    // Sends a record, waiting for room in the output channel. Returns false
    // when the run is over: cancelled, or nobody is listening any more.
    async fn emit(&self, record: UrlRecord) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.records.send(record) => {
                if sent.is_ok() {
                    self.stats.record_emitted();
                }
                sent.is_ok()
            }
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is a bounded mpsc channel?
//    - "multi-producer, single-consumer": many senders, one receiver
//    - Bounded means it holds at most `capacity` items
//    - `send().await` waits while the channel is full, which slows the
//      producer down to the pace of the workers (backpressure)
//
// 2. What does for_each_concurrent do?
//    - It runs the closure for many stream items at the same time
//    - The limit caps how many are in flight; the next item is only pulled
//      when one finishes
//    - Unlike spawning a task per URL, memory use stays flat
//
// 3. Why tokio::select! with `biased;`?
//    - select! waits on several futures and runs the first one that is ready
//    - `biased;` checks the branches top to bottom instead of randomly
//    - Putting cancellation first means a cancelled run never sends again
//
// 4. How does the record stream know when to end?
//    - A receiver ends once every Sender is dropped
//    - The only records Sender lives inside the shared Worker
//    - When the pool finishes, the last Arc<Worker> drops and the stream closes
//
// 5. Why saturating_mul for the queue size?
//    - `a * b` on usize panics in debug builds (wraps in release) on overflow
//    - saturating_mul stops at usize::MAX instead; the clamp then caps it
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use std::collections::HashSet;
    use std::time::Duration;

    fn harvester_for(server: &ServerGuard, config: HarvestConfig) -> Harvester {
        let archive = ArchiveConfig {
            base_url: server.url(),
            requests_per_minute: 6000,
            timeout: Duration::from_secs(5),
        };
        Harvester::new(&archive, config).unwrap()
    }

    async fn mock_index(server: &mut ServerGuard, target: &str, body: &str) -> Mock {
        server
            .mock("GET", "/cdx/search/cdx")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("url".into(), target.into()),
                Matcher::UrlEncoded("output".into(), "txt".into()),
            ]))
            .with_body(body)
            .create_async()
            .await
    }

    async fn mock_any_snapshots(server: &mut ServerGuard) -> Mock {
        server
            .mock("GET", "/cdx/search/cdx")
            .match_query(Matcher::UrlEncoded("output".into(), "json".into()))
            .with_body(r#"[["timestamp","original"],["2019","http://example.com/"]]"#)
            .expect(0)
            .create_async()
            .await
    }

    async fn collect(harvester: &Harvester, domain: &str) -> Vec<UrlRecord> {
        let stream = harvester.run(domain, CancellationToken::new());
        tokio::time::timeout(Duration::from_secs(10), stream.collect::<Vec<_>>())
            .await
            .expect("record stream should close")
    }

    fn values(records: &[UrlRecord]) -> HashSet<&str> {
        records.iter().map(|r| r.value.as_str()).collect()
    }

    #[tokio::test]
    async fn test_exact_domain_scope() {
        let mut server = Server::new_async().await;
        mock_index(
            &mut server,
            "example.com/*",
            "http://example.com/a\nhttp://sub.example.com/b\n\n",
        )
        .await;

        let harvester = harvester_for(&server, HarvestConfig::default());
        let records = collect(&harvester, "example.com").await;

        assert_eq!(
            records,
            vec![UrlRecord {
                source: "wayback".to_string(),
                value: "http://example.com/a".to_string(),
            }]
        );
        assert_eq!(harvester.stats().snapshot().out_of_scope, 1);
    }

    #[tokio::test]
    async fn test_subdomain_scope() {
        let mut server = Server::new_async().await;
        mock_index(
            &mut server,
            "*.example.com/*",
            "http://example.com/a\nhttp://sub.example.com/b\n\n",
        )
        .await;

        let config = HarvestConfig {
            include_subdomains: true,
            ..HarvestConfig::default()
        };
        let harvester = harvester_for(&server, config);
        let records = collect(&harvester, "example.com").await;

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.source == "wayback"));
        assert_eq!(
            values(&records),
            HashSet::from(["http://example.com/a", "http://sub.example.com/b"])
        );
    }

    #[tokio::test]
    async fn test_flags_off_emits_exactly_the_index() {
        let mut server = Server::new_async().await;
        let index: Vec<String> = (0..50).map(|i| format!("http://example.com/p{}", i)).collect();
        mock_index(&mut server, "example.com/*", &index.join("\n")).await;
        let snapshots = mock_any_snapshots(&mut server).await;

        let config = HarvestConfig {
            concurrency: 4,
            ..HarvestConfig::default()
        };
        let harvester = harvester_for(&server, config);
        let records = collect(&harvester, "example.com").await;

        snapshots.assert_async().await;
        assert_eq!(records.len(), 50);
        assert_eq!(
            values(&records),
            index.iter().map(String::as_str).collect::<HashSet<_>>()
        );
        assert_eq!(harvester.stats().snapshot().records, 50);
    }

    #[tokio::test]
    async fn test_robots_expansion() {
        let mut server = Server::new_async().await;
        mock_index(&mut server, "example.com/*", "http://example.com/robots.txt\n").await;
        server
            .mock("GET", "/cdx/search/cdx")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("url".into(), "http://example.com/robots.txt".into()),
                Matcher::UrlEncoded("output".into(), "json".into()),
            ]))
            .with_body(
                r#"[["timestamp","original"],["20170101000000","http://example.com/robots.txt"]]"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", Matcher::Regex(r"^/web/20170101000000if_/".into()))
            .with_body("User-agent: *\nSitemap: http://example.com/sitemap.xml\n")
            .create_async()
            .await;

        let config = HarvestConfig {
            parse_robots: true,
            ..HarvestConfig::default()
        };
        let harvester = harvester_for(&server, config);
        let records = collect(&harvester, "example.com").await;

        assert_eq!(
            records,
            vec![
                UrlRecord {
                    source: "wayback".to_string(),
                    value: "http://example.com/robots.txt".to_string(),
                },
                UrlRecord {
                    source: "wayback:robots".to_string(),
                    value: "http://example.com/sitemap.xml".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_source_expansion_filters_scope() {
        let mut server = Server::new_async().await;
        mock_index(&mut server, "example.com/*", "http://example.com/page\n").await;
        server
            .mock("GET", "/cdx/search/cdx")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("url".into(), "http://example.com/page".into()),
                Matcher::UrlEncoded("output".into(), "json".into()),
            ]))
            .with_body(r#"[["timestamp","original"],["2019","http://example.com/page"]]"#)
            .create_async()
            .await;
        server
            .mock("GET", Matcher::Regex(r"^/web/2019if_/".into()))
            .with_body(r#"<a href="/api/v2">api</a> <a href="https://sub.example.com/x">x</a>"#)
            .create_async()
            .await;

        let config = HarvestConfig {
            parse_source: true,
            ..HarvestConfig::default()
        };
        let harvester = harvester_for(&server, config);
        let records = collect(&harvester, "example.com").await;

        assert_eq!(
            records,
            vec![
                UrlRecord {
                    source: "wayback".to_string(),
                    value: "http://example.com/page".to_string(),
                },
                UrlRecord {
                    source: "wayback:source".to_string(),
                    value: "http://example.com/api/v2".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_media_urls_are_never_expanded() {
        let mut server = Server::new_async().await;
        mock_index(
            &mut server,
            "example.com/*",
            "http://example.com/logo.PNG\nhttp://example.com/icon.svg?v=2\nhttp://example.com/f.woff2\n",
        )
        .await;
        let snapshots = mock_any_snapshots(&mut server).await;

        let config = HarvestConfig {
            parse_robots: true,
            parse_source: true,
            ..HarvestConfig::default()
        };
        let harvester = harvester_for(&server, config);
        let records = collect(&harvester, "example.com").await;

        snapshots.assert_async().await;
        assert_eq!(records.len(), 3);
        assert_eq!(harvester.stats().snapshot().expansions, 0);
    }

    #[tokio::test]
    async fn test_robots_only_does_not_expand_pages() {
        let mut server = Server::new_async().await;
        mock_index(&mut server, "example.com/*", "http://example.com/index.html\n").await;
        let snapshots = mock_any_snapshots(&mut server).await;

        let config = HarvestConfig {
            parse_robots: true,
            ..HarvestConfig::default()
        };
        let harvester = harvester_for(&server, config);
        let records = collect(&harvester, "example.com").await;

        snapshots.assert_async().await;
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_stream_closes_when_index_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let config = HarvestConfig {
            parse_robots: true,
            parse_source: true,
            ..HarvestConfig::default()
        };
        let harvester = harvester_for(&server, config);
        let records = collect(&harvester, "example.com").await;

        assert!(records.is_empty());
        assert_eq!(harvester.stats().snapshot().status_failures, 1);
    }

    #[tokio::test]
    async fn test_stream_closes_when_every_expansion_fails() {
        let mut server = Server::new_async().await;
        mock_index(
            &mut server,
            "example.com/*",
            "http://example.com/robots.txt\nhttp://example.com/a\nhttp://example.com/b\n",
        )
        .await;
        server
            .mock("GET", "/cdx/search/cdx")
            .match_query(Matcher::UrlEncoded("output".into(), "json".into()))
            .with_status(502)
            .create_async()
            .await;

        let config = HarvestConfig {
            parse_robots: true,
            parse_source: true,
            ..HarvestConfig::default()
        };
        let harvester = harvester_for(&server, config);
        let records = collect(&harvester, "example.com").await;

        assert_eq!(records.len(), 3);
        let stats = harvester.stats().snapshot();
        assert_eq!(stats.expansions, 3);
        assert_eq!(stats.status_failures, 3);
    }

    #[test]
    fn test_queue_capacity_is_bounded() {
        assert_eq!(queue_capacity(1), QUEUE_MULTIPLIER);
        assert_eq!(queue_capacity(20), 20 * QUEUE_MULTIPLIER);
        assert_eq!(queue_capacity(usize::MAX), MAX_QUEUE_CAPACITY);
        assert_eq!(queue_capacity(0), 1);
    }

    #[tokio::test]
    async fn test_huge_concurrency_still_runs() {
        let mut server = Server::new_async().await;
        mock_index(&mut server, "example.com/*", "http://example.com/a
http://example.com/b
").await;

        let config = HarvestConfig {
            concurrency: usize::MAX,
            ..HarvestConfig::default()
        };
        let harvester = harvester_for(&server, config);
        let records = collect(&harvester, "example.com").await;

        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_producer_waits_for_a_full_queue() {
        let mut server = Server::new_async().await;
        let index: Vec<String> = (0..200).map(|i| format!("http://example.com/p{}", i)).collect();
        mock_index(&mut server, "example.com/*", &index.join("\n")).await;

        let config = HarvestConfig {
            concurrency: 1,
            ..HarvestConfig::default()
        };
        let harvester = harvester_for(&server, config);
        let cancel = CancellationToken::new();
        let stream = harvester.run("example.com", cancel.clone());

        // Nobody reads: the output channel fills, the single worker blocks
        // on its next emit, then the work queue fills behind it.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let before_cancel = harvester.stats().snapshot();
        cancel.cancel();

        let records = tokio::time::timeout(Duration::from_secs(5), stream.collect::<Vec<_>>())
            .await
            .expect("cancelled stream should close");

        let capacity = queue_capacity(1);
        assert_eq!(before_cancel.indexed, index.len());
        assert!(before_cancel.records <= capacity);
        assert!(before_cancel.dispatched <= 3 * capacity);
        assert!(before_cancel.dispatched < before_cancel.indexed);
        assert!(records.len() <= capacity);
        assert!(harvester.stats().snapshot().dispatched < index.len());
    }

    #[tokio::test]
    async fn test_cancel_closes_undrained_stream() {
        let mut server = Server::new_async().await;
        let index: Vec<String> = (0..500).map(|i| format!("http://example.com/p{}", i)).collect();
        mock_index(&mut server, "example.com/*", &index.join("\n")).await;

        let config = HarvestConfig {
            concurrency: 2,
            ..HarvestConfig::default()
        };
        let harvester = harvester_for(&server, config);
        let cancel = CancellationToken::new();
        let stream = harvester.run("example.com", cancel.clone());

        // Let the output channel fill up with nobody reading it.
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();

        let records = tokio::time::timeout(Duration::from_secs(5), stream.collect::<Vec<_>>())
            .await
            .expect("cancelled stream should close");

        assert!(records.len() < index.len());
    }
}
