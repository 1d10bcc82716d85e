// src/extract/mod.rs
// =============================================================================
// Turns archived bodies into candidate URLs.
//
// Submodules:
// - robots: Sitemap/Allow/Disallow entries from robots.txt
// - source: URL-shaped strings from page source (regex, not a parser)
//
// Both are pure functions over text; fetching lives in `archive` and the
// wiring lives in `harvest::expand`.
// =============================================================================

mod robots;
mod source;

pub use robots::extract_robots_urls;
pub use source::extract_source_urls;
