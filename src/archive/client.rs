// src/archive/client.rs
// =============================================================================
// HTTP client for the Wayback Machine.
//
// Three endpoints are used, all plain GETs:
// - CDX index, text output:  every URL known for a domain (one per line)
// - CDX index, JSON output:  the distinct captures of a single URL
// - replay ("if_" mode):     the raw archived bytes of one capture
//
// Every request waits on the shared RateLimiter first and races the
// caller's CancellationToken, so a cancelled run stops both waiting for a
// slot and waiting for the network.
// =============================================================================

use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::error::ArchiveError;
use super::limiter::{RateLimiter, DEFAULT_REQUESTS_PER_MINUTE};

pub const DEFAULT_BASE_URL: &str = "https://web.archive.org";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// Text the replay endpoint serves instead of content when it can't find
// the capture it just listed.
const CAPTURE_UNAVAILABLE: &str =
    "This page can't be displayed. Please use the correct URL address to access";

/// Where the archive lives and how hard we may hit it.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub base_url: String,
    pub requests_per_minute: u32,
    pub timeout: Duration,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// One archived capture of a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub timestamp: String,
    pub original: String,
}

pub struct ArchiveClient {
    http: Client,
    base_url: String,
    limiter: RateLimiter,
}

impl ArchiveClient {
    pub fn new(config: &ArchiveConfig) -> anyhow::Result<Self> {
        // A bad --archive-url fails here, not as a transport error per fetch.
        Url::parse(&config.base_url)
            .map_err(|e| anyhow::anyhow!("Invalid archive URL '{}': {}", config.base_url, e))?;

        let http = Client::builder().timeout(config.timeout).build()?;
        let limiter = RateLimiter::new(config.requests_per_minute);
        debug!(
            base_url = %config.base_url,
            requests_per_minute = limiter.requests_per_minute(),
            "archive client ready"
        );

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter,
        })
    }

    /// Lists every URL the archive has indexed under `domain`.
    ///
    /// With `include_subdomains` the query becomes `*.domain`, which the CDX
    /// server expands to the domain and all of its subdomains. Results are
    /// collapsed by URL key, so each canonical URL appears once. Blank lines
    /// are dropped; order is whatever the archive returns.
    pub async fn urls(
        &self,
        domain: &str,
        include_subdomains: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ArchiveError> {
        let target = if include_subdomains {
            format!("*.{}/*", domain)
        } else {
            format!("{}/*", domain)
        };

        let body = self
            .get(
                &self.cdx_endpoint(),
                &[
                    ("url", target.as_str()),
                    ("output", "txt"),
                    ("fl", "original"),
                    ("collapse", "urlkey"),
                ],
                cancel,
            )
            .await?;

        Ok(body
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Lists the distinct-content captures of a single URL.
    ///
    /// Fewer than two rows means there is nothing to expand; otherwise the
    /// first row is skipped and the remaining N-1 are returned.
    pub async fn snapshots(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Snapshot>, ArchiveError> {
        let body = self
            .get(
                &self.cdx_endpoint(),
                &[
                    ("url", url),
                    ("output", "json"),
                    ("fl", "timestamp,original"),
                    ("collapse", "digest"),
                ],
                cancel,
            )
            .await?;

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(String, String)> = serde_json::from_str(&body)?;
        if rows.len() < 2 {
            return Ok(Vec::new());
        }

        // JSON output opens with the field-name row ["timestamp","original"].
        Ok(rows
            .into_iter()
            .skip(1)
            .map(|(timestamp, original)| Snapshot { timestamp, original })
            .collect())
    }

    /// Fetches the raw archived body of one capture.
    ///
    /// An empty string is a valid answer (nothing to scan). The archive's
    /// "can't be displayed" page is reported as CaptureUnavailable.
    pub async fn content(
        &self,
        snapshot: &Snapshot,
        cancel: &CancellationToken,
    ) -> Result<String, ArchiveError> {
        // "if_" asks for the capture without the Wayback toolbar/frame
        let replay_url = format!(
            "{}/web/{}if_/{}",
            self.base_url, snapshot.timestamp, snapshot.original
        );

        let body = self.get(&replay_url, &[], cancel).await?;

        if body.contains(CAPTURE_UNAVAILABLE) {
            return Err(ArchiveError::CaptureUnavailable {
                timestamp: snapshot.timestamp.clone(),
                url: snapshot.original.clone(),
            });
        }

        Ok(body)
    }

    fn cdx_endpoint(&self) -> String {
        format!("{}/cdx/search/cdx", self.base_url)
    }

    // Rate-limited GET that gives up as soon as `cancel` fires.
    async fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<String, ArchiveError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ArchiveError::Cancelled),
            result = self.send(url, query) => result,
        }
    }

    // Returns the body of a 2xx response.
    async fn send(&self, url: &str, query: &[(&str, &str)]) -> Result<String, ArchiveError> {
        self.limiter.acquire().await;

        let mut builder = self.http.get(url);
        if !query.is_empty() {
            builder = builder.query(query);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ArchiveError::Status {
                status,
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}
