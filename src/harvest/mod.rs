// src/harvest/mod.rs
// =============================================================================
// The harvesting pipeline: index query, per-URL fan-out, expansion.
//
// Submodules:
// - dispatch: Harvester, the producer/worker-pool pipeline
// - expand:   robots.txt and page-source expanders (lazy streams)
// - scope:    in-scope checks, media denylist, robots.txt detection
// - record:   the UrlRecord type emitted on the output stream
// - stats:    failure/emission counters for diagnostics
// =============================================================================

mod dispatch;
mod expand;
mod record;
mod scope;
mod stats;

pub use dispatch::{HarvestConfig, Harvester, DEFAULT_CONCURRENCY};
pub use record::UrlRecord;
pub use stats::StatsSnapshot;
