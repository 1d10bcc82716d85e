// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// There is a single command: give it a domain, get back every URL the
// Wayback Machine has seen for it. Flags switch on the (slow, request-hungry)
// robots.txt and page-source expansion and tune how hard we hit the archive.
// =============================================================================

use clap::Parser;
use std::time::Duration;

use crate::archive::{
    ArchiveConfig, DEFAULT_BASE_URL, DEFAULT_REQUESTS_PER_MINUTE, DEFAULT_TIMEOUT_SECS,
};
use crate::harvest::{HarvestConfig, DEFAULT_CONCURRENCY};

// #[derive(Parser)] tells clap to automatically generate parsing code
// The #[command(...)] attributes configure how the CLI behaves
#[derive(Parser, Debug)]
#[command(
    name = "wayback-harvest",
    version = "0.1.0",
    about = "Harvest every URL the Wayback Machine has recorded for a domain",
    long_about = "wayback-harvest queries the Wayback Machine's CDX index for every URL it has \
                  archived under a domain. With --parse-robots and --parse-source it also digs \
                  through archived robots.txt files and page source for URLs the index missed."
)]
pub struct Cli {
    /// Target domain (e.g., example.com)
    pub domain: String,

    /// Also report URLs on subdomains of the target domain
    #[arg(long)]
    pub include_subdomains: bool,

    /// Mine archived robots.txt files for more URLs
    #[arg(long)]
    pub parse_robots: bool,

    /// Mine archived page source for more URLs
    #[arg(long)]
    pub parse_source: bool,

    /// How many URLs are processed at the same time
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Maximum archive requests per minute
    ///
    /// The archive starts refusing connections if this is set too high.
    #[arg(long, default_value_t = DEFAULT_REQUESTS_PER_MINUTE)]
    pub rate_limit: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Base URL of the archive (useful for mirrors and testing)
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub archive_url: String,

    /// Stop after this many URLs have been printed
    #[arg(long)]
    pub limit: Option<usize>,

    /// Print one JSON object per line instead of bare URLs
    #[arg(long)]
    pub json: bool,

    /// Prefix each URL with where it was found (e.g., [wayback:robots])
    #[arg(long, conflicts_with = "json")]
    pub show_source: bool,
}

impl From<&Cli> for ArchiveConfig {
    fn from(cli: &Cli) -> Self {
        ArchiveConfig {
            base_url: cli.archive_url.clone(),
            requests_per_minute: cli.rate_limit,
            timeout: Duration::from_secs(cli.timeout),
        }
    }
}

impl From<&Cli> for HarvestConfig {
    fn from(cli: &Cli) -> Self {
        HarvestConfig {
            include_subdomains: cli.include_subdomains,
            parse_robots: cli.parse_robots,
            parse_source: cli.parse_source,
            concurrency: cli.concurrency.max(1),
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why `From<&Cli>` instead of passing Cli around?
//    - The harvester shouldn't know about command-line flags
//    - From impls keep the translation in one place
//    - `HarvestConfig::from(&cli)` or `(&cli).into()` both work
//
// 2. What is default_value_t?
//    - A typed default (here a const from the library modules)
//    - clap shows it in --help automatically
//
// 3. What does conflicts_with do?
//    - clap rejects `--json --show-source` with a helpful error
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["wayback-harvest", "example.com"]);
        assert_eq!(cli.domain, "example.com");
        assert!(!cli.include_subdomains);
        assert!(!cli.parse_robots);
        assert!(!cli.parse_source);
        assert_eq!(cli.rate_limit, 40);
        assert_eq!(cli.limit, None);

        let archive = ArchiveConfig::from(&cli);
        assert_eq!(archive.base_url, "https://web.archive.org");
        assert_eq!(archive.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_flags_map_to_config() {
        let cli = Cli::parse_from([
            "wayback-harvest",
            "example.com",
            "--include-subdomains",
            "--parse-robots",
            "--parse-source",
            "--concurrency",
            "0",
        ]);
        let config = HarvestConfig::from(&cli);
        assert!(config.include_subdomains);
        assert!(config.parse_robots);
        assert!(config.parse_source);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_json_conflicts_with_show_source() {
        let result =
            Cli::try_parse_from(["wayback-harvest", "example.com", "--json", "--show-source"]);
        assert!(result.is_err());
    }
}
