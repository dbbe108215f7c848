//! Command-line interface definitions for the newspaper crawler.
//!
//! Flags override the matching values of the YAML config file.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the crawler.
///
/// # Examples
///
/// ```sh
/// # Ask for the newspaper interactively
/// newspaper_crawler
///
/// # Non-interactive run into ./corpus, with a JSON run report
/// newspaper_crawler -n elpais -o ./corpus --report ./corpus/elpais.json
///
/// # Text only, no pauses
/// newspaper_crawler -n abc --no-images --pace-every 0
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Newspaper to crawl; prompts on stdin when omitted
    #[arg(short, long, env = "NEWSPAPER")]
    pub newspaper: Option<String>,

    /// Root directory for the stored articles (default: config `output_dir`)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the available newspapers and exit
    #[arg(long)]
    pub list: bool,

    /// Write a JSON summary of the run to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Store article text only, without downloading images
    #[arg(long)]
    pub no_images: bool,

    /// Pause after this many processed links (0 disables pacing)
    #[arg(long)]
    pub pace_every: Option<u64>,

    /// Length of each pause, in seconds
    #[arg(long)]
    pub pace_secs: Option<u64>,
}
