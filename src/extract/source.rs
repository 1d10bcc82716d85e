// src/extract/source.rs
// =============================================================================
// Pulls candidate URLs out of archived page source (HTML, JS, JSON, ...).
//
// Pattern-based, not a DOM parse: bodies may be truncated HTML, minified JS
// or JSON.
//
// Two shapes are recognised:
// - absolute or protocol-relative URLs: https://cdn.example.com/app.js, //example.com/x
// - quoted root-relative paths: "/api/v1/users", '/static/app.css'
//
// Only URLs on the target domain (or one of its subdomains) are returned.
//
// Replayed pages still carry archive-rewritten links such as
// /web/20190101000000/http://example.com/about or
// https://web.archive.org/web/20190101000000im_/http://example.com/logo.png.
// The archive prefix is stripped first so the embedded original is scanned.
// =============================================================================

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

// Any host: replay mirrors and a custom --archive-url rewrite links the same way
static ARCHIVE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:(?:https?:)?//[a-z0-9][a-z0-9.-]*(?::\d{1,5})?)?/web/\d{1,14}[a-z_]*/((?:https?:)?//)")
        .expect("archive prefix regex is valid")
});

static ABSOLUTE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:https?:)?//[a-z0-9][a-z0-9.-]*(?::\d{1,5})?(?:[/?#][^\s"'<>()\[\]{}\\`|^]*)?"#)
        .expect("absolute URL regex is valid")
});

static QUOTED_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["'](/[^/\s"'<>\\][^\s"'<>\\]*)["']"#).expect("quoted path regex is valid")
});

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', ')', '!'];

// Extracts every same-domain URL from a page body
//
// Parameters:
//   content: the archived body
//   page_url: the URL the body was captured from (for relative paths)
//   root_domain: only hosts equal to or under this domain are kept
//
// Returns: absolute URLs, in order of appearance, possibly with repeats
pub fn extract_source_urls(content: &str, page_url: &str, root_domain: &str) -> Vec<String> {
    let page = match Url::parse(page_url) {
        Ok(url) => url,
        Err(_) => return Vec::new(),
    };

    // JSON and JS strings often escape slashes: https:\/\/example.com\/x
    let content = content.replace("\\/", "/");
    let content = ARCHIVE_PREFIX.replace_all(&content, "$1");
    let root_domain = root_domain.to_ascii_lowercase();

    let absolute = ABSOLUTE_URL
        .find_iter(&content)
        .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION));

    let relative = QUOTED_PATH
        .captures_iter(&content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str());

    absolute
        .chain(relative)
        .filter_map(|candidate| page.join(candidate).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .filter(|url| {
            url.host_str()
                .map(|host| belongs_to(host, &root_domain))
                .unwrap_or(false)
        })
        .map(|url| url.to_string())
        .collect()
}

fn belongs_to(host: &str, root_domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == root_domain
        || host
            .strip_suffix(root_domain)
            .map(|prefix| prefix.ends_with('.'))
            .unwrap_or(false)
}
