// src/extract/robots.rs
// =============================================================================
// Pulls candidate URLs out of a robots.txt body.
//
// Old robots.txt files are a good source of forgotten paths: admin panels,
// staging areas and sitemaps that were later removed. We look at three
// directives:
//
//   Sitemap:  https://example.com/sitemap.xml   (usually absolute)
//   Allow:    /public/
//   Disallow: /admin/*.php$
//
// Paths are resolved against the root of the robots.txt host. Wildcard
// patterns are cut at the first `*` because the prefix is still a real path.
// =============================================================================

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

// Directive name, then everything up to end of line. `[ \t]` rather than
// `\s` so an empty directive can't swallow the following line.
static DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:sitemap|allow|disallow)[ \t]*:[ \t]*([^\r\n]*)")
        .expect("robots directive regex is valid")
});

// Extracts every URL referenced by a robots.txt body
//
// Parameters:
//   content: the robots.txt text
//   robots_url: where the file was served from (used to resolve paths)
//
// Returns: absolute http(s) URLs, in file order, possibly with repeats
pub fn extract_robots_urls(content: &str, robots_url: &str) -> Vec<String> {
    let root = match Url::parse(robots_url).and_then(|url| url.join("/")) {
        Ok(root) => root,
        Err(_) => return Vec::new(),
    };

    DIRECTIVE
        .captures_iter(content)
        .filter_map(|caps| clean_entry(caps.get(1)?.as_str()))
        .filter_map(|entry| root.join(entry).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|url| url.to_string())
        .collect()
}

// Strips comments, wildcards and end anchors. Returns None for entries that
// only point at the site root.
fn clean_entry(raw: &str) -> Option<&str> {
    let entry = raw.split('#').next().unwrap_or_default();
    let entry = entry.split('*').next().unwrap_or_default();
    let entry = entry.trim().trim_end_matches('$');

    if entry.is_empty() || entry == "/" {
        None
    } else {
        Some(entry)
    }
}
