// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (stderr, so stdout stays clean for piping)
// 3. Start a harvest and print records as they stream in
// 4. Stop early on Ctrl-C or once --limit records have been printed
// 5. Exit with proper code (0 = success, 2 = error)
// =============================================================================

mod archive;       // src/archive/ - Wayback Machine HTTP client + rate limiter
mod cli;           // src/cli.rs - command-line parsing
mod extract;       // src/extract/ - URL extraction from robots.txt / page source
mod harvest;       // src/harvest/ - the concurrent harvesting pipeline

use anyhow::{Context, Result};
use clap::Parser;
use futures::{Stream, StreamExt};
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use archive::ArchiveConfig;
use cli::Cli;
use harvest::{HarvestConfig, Harvester, StatsSnapshot, UrlRecord};

#[tokio::main]
async fn main() {
    init_logging();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,wayback_harvest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    let harvester = Harvester::new(&ArchiveConfig::from(&cli), HarvestConfig::from(&cli))
        .context("failed to set up the archive client")?;

    let cancel = CancellationToken::new();

    // Ctrl-C cancels the run; records already received are still printed.
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping harvest");
            on_interrupt.cancel();
        }
    });

    let records = harvester.run(&cli.domain, cancel.clone());
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let printed = print_records(records, &mut out, &cli, &cancel).await?;

    log_summary(&harvester.stats().snapshot(), printed);
    Ok(0)
}

// Prints records until the stream ends or --limit is reached
//
// The limit is checked before each record, so --limit 0 prints nothing.
// Reaching the limit cancels the harvest.
//
// Returns: how many records were printed
async fn print_records(
    mut records: impl Stream<Item = UrlRecord> + Unpin,
    out: &mut impl Write,
    cli: &Cli,
    cancel: &CancellationToken,
) -> Result<usize> {
    let mut printed = 0usize;

    loop {
        if cli.limit.is_some_and(|limit| printed >= limit) {
            info!(limit = printed, "limit reached, stopping harvest");
            cancel.cancel();
            break;
        }

        let Some(record) = records.next().await else {
            break;
        };
        print_record(out, &record, cli)?;
        printed += 1;
    }

    out.flush()?;
    Ok(printed)
}

// Writes one record in the format chosen on the command line
fn print_record(out: &mut impl Write, record: &UrlRecord, cli: &Cli) -> Result<()> {
    if cli.json {
        serde_json::to_writer(&mut *out, record)?;
        writeln!(out)?;
    } else if cli.show_source {
        writeln!(out, "[{}] {}", record.source, record.value)?;
    } else {
        writeln!(out, "{}", record.value)?;
    }
    Ok(())
}

fn log_summary(stats: &StatsSnapshot, printed: usize) {
    info!(
        printed,
        indexed = stats.indexed,
        dispatched = stats.dispatched,
        out_of_scope = stats.out_of_scope,
        expansions = stats.expansions,
        "harvest summary"
    );

    if stats.failures() > 0 {
        warn!(
            transport = stats.transport_failures,
            http_status = stats.status_failures,
            malformed = stats.malformed_responses,
            capture_unavailable = stats.captures_unavailable,
            "some archive requests failed; results may be incomplete"
        );
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why print with writeln! on a locked stdout?
//    - println! locks stdout on every call
//    - A harvest can print hundreds of thousands of lines
//    - Locking once and writing through the handle is much cheaper
//
// 2. What is a CancellationToken?
//    - A cheap, cloneable "stop" flag from tokio-util
//    - Every clone sees the same state; cancel() on one wakes all waiters
//    - The harvester checks it before every archive request and send
//
// 3. Why break out of the loop after cancelling?
//    - Dropping the stream tells the harvester nobody is listening
//    - Workers stop as soon as they try to emit again
// -----------------------------------------------------------------------------
