// src/harvest/scope.rs
// =============================================================================
// Decides which URLs a run may report and which are worth expanding.
//
// - ScopeSpec::contains: is the URL's host the target domain (or, when
//   allowed, a subdomain of it)?
// - is_media_url: images, audio, video and fonts never contain useful links,
//   so we never spend archive requests on them.
// - is_robots_url: robots.txt files get the robots expander instead of the
//   source expander.
// =============================================================================

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

// Extension followed by a query, fragment or the end of the URL.
static MEDIA_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\.(apng|bpm|png|bmp|gif|heif|ico|cur|jpg|jpeg|jfif|pjp|pjpeg|psd|raw|svg|tif|tiff|webp|xbm|3gp|aac|flac|mpg|mpeg|mp3|mp4|m4a|m4v|m4p|oga|ogg|ogv|mov|wav|webm|eot|woff|woff2|ttf|otf)(?:\?|#|$)",
    )
    .expect("media extension regex is valid")
});

/// The set of hosts a harvest run is allowed to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSpec {
    root_domain: String,
    include_subdomains: bool,
}

impl ScopeSpec {
    pub fn new(root_domain: &str, include_subdomains: bool) -> Self {
        Self {
            root_domain: root_domain.trim().trim_end_matches('.').to_ascii_lowercase(),
            include_subdomains,
        }
    }

    pub fn root_domain(&self) -> &str {
        &self.root_domain
    }

    /// True if `url` parses and its host is the root domain or, when
    /// subdomains are included, a strict subdomain of it.
    pub fn contains(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };

        let host = match parsed.host_str() {
            Some(host) => host.trim_end_matches('.').to_ascii_lowercase(),
            None => return false,
        };

        if host == self.root_domain {
            return true;
        }

        self.include_subdomains
            && host
                .strip_suffix(self.root_domain.as_str())
                .map(|prefix| prefix.len() > 1 && prefix.ends_with('.'))
                .unwrap_or(false)
    }
}

pub fn is_media_url(url: &str) -> bool {
    MEDIA_URL.is_match(url)
}

/// True when the URL's path is exactly `/robots.txt`.
pub fn is_robots_url(url: &str) -> bool {
    Url::parse(url)
        .map(|parsed| parsed.path() == "/robots.txt")
        .unwrap_or(false)
}
