//! # Newspaper Crawler
//!
//! Builds a local corpus of news articles from the front pages of Spanish
//! newspapers. Each run downloads the home page of one newspaper, follows
//! the article links found there, and stores every article it has not
//! stored before as a directory holding its metadata, its text and its
//! images.
//!
//! ## Usage
//!
//! ```sh
//! newspaper_crawler -n elpais -o ./corpus
//! ```
//!
//! ## Architecture
//!
//! 1. **Selection**: pick a newspaper from the site table (flag or stdin prompt)
//! 2. **Discovery**: fetch the home page and collect the article links
//! 3. **Dedup**: skip links whose article directory already exists
//! 4. **Extraction**: fetch each new article and pull title, body and images
//! 5. **Storage**: write `METADATA.txt`, `text_news.txt` and `img/` atomically
//! 6. **Pacing**: pause every N links to stay under remote rate limits

use clap::Parser;
use std::error::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod downloader;
mod extract;
mod fetch;
mod links;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod store;
mod utils;

use cli::Cli;
use config::{CrawlerConfig, load_config};
use downloader::Downloader;
use fetch::{HttpFetcher, RetryFetch};
use outputs::json;
use pipeline::{CrawlOptions, CrawlPipeline};
use scrapers::SiteRegistry;
use store::ArticleStore;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Config & site table ----
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => CrawlerConfig::default(),
    };
    apply_overrides(&mut config, &args);
    let registry = SiteRegistry::with_sites(config.sites.clone())?;

    if args.list {
        println!("{}", registry.menu());
        return Ok(());
    }

    let name = match &args.newspaper {
        Some(name) => name.clone(),
        None => prompt_newspaper(&registry).await?,
    };
    // Unknown names fail here, before any network access.
    let profile = registry.get(&name)?;
    info!(newspaper = %profile.name, home = %profile.home_url, "newspaper_crawler starting up");

    // Early check: ensure the output root is writable
    if let Err(e) = ensure_writable_dir(&config.output_dir).await {
        error!(
            path = %config.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Pipeline ----
    let http = HttpFetcher::new(&config.fetch)?;
    let downloader = Downloader::from_config(&config.images, http.client().clone());
    let fetcher = RetryFetch::new(
        http,
        config.fetch.max_retries,
        config.fetch.retry_base_delay(),
    );
    let pipeline = CrawlPipeline::for_site(
        &registry,
        &name,
        CrawlOptions::from(&config),
        fetcher,
        downloader,
        ArticleStore::new(&config.output_dir),
    )?;

    let summary = match pipeline.run().await {
        Ok(summary) => summary,
        Err(e) => {
            error!(newspaper = %pipeline.profile().name, error = %e, "Crawl aborted");
            return Err(e.into());
        }
    };

    if let Some(report) = &args.report {
        if let Err(e) = json::write_summary(&summary, report).await {
            error!(path = %report.display(), error = %e, "Failed to write crawl report");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        downloaded = summary.downloaded,
        already_present = summary.already_present,
        failed = summary.failed,
        "Execution complete"
    );

    Ok(())
}

/// Command-line flags win over the config file.
fn apply_overrides(config: &mut CrawlerConfig, args: &Cli) {
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if args.no_images {
        config.images.enabled = false;
    }
    if let Some(every) = args.pace_every {
        config.pacing.every = every;
    }
    if let Some(secs) = args.pace_secs {
        config.pacing.pause_secs = secs;
    }
}

/// Print the menu and read one newspaper name from stdin.
async fn prompt_newspaper(registry: &SiteRegistry) -> Result<String, Box<dyn Error>> {
    println!("{}", registry.menu());
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim().to_string())
}
