//! Crawler configuration loaded from an optional YAML file.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock behaviour: store under the current directory, pause 60 seconds every
//! 30 links, download images over HTTP.
//!
//! ```yaml
//! output_dir: ./news
//! pacing:
//!   every: 30
//!   pause_secs: 60
//! fetch:
//!   timeout_secs: 30
//!   max_retries: 2
//! images:
//!   downloader: wget
//!   scope: document
//! sites:
//!   - name: localpaper
//!     home_url: https://localpaper.example
//!     link_tag_name: h2
//!     link_tag_class: headline
//!     title_tag_name: h1
//!     title_tag_class: title
//!     body_tag_name: div
//!     body_tag_class: story
//! ```

use crate::models::SiteProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

/// Browser identifier sent to sites that reject default client identifiers.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1; WOW64; rv:50.0) Gecko/20100101 Firefox/50.0";

/// Errors that stop a run before any network access.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no such newspaper supported: {name:?} (available: {})", available.join(", "))]
    UnknownNewspaper { name: String, available: Vec<String> },
    #[error("invalid site {name:?}: {reason}")]
    InvalidSite { name: String, reason: String },
    #[error("invalid selector {selector:?} for site {site:?}: {reason}")]
    InvalidSelector {
        site: String,
        selector: String,
        reason: String,
    },
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Root under which one directory per newspaper is created.
    pub output_dir: PathBuf,
    pub pacing: PacingConfig,
    pub fetch: FetchConfig,
    pub images: ImageConfig,
    /// Extra newspapers; a name matching a built-in replaces it.
    pub sites: Vec<SiteProfile>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            pacing: PacingConfig::default(),
            fetch: FetchConfig::default(),
            images: ImageConfig::default(),
            sites: Vec::new(),
        }
    }
}

/// Pause `pause_secs` after every `every` processed links. `every = 0`
/// disables pacing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PacingConfig {
    pub every: u64,
    pub pause_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            every: 30,
            pause_secs: 60,
        }
    }
}

impl PacingConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    pub browser_user_agent: String,
    pub timeout_secs: u64,
    /// Extra attempts for network errors, HTTP 429 and HTTP 5xx.
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            browser_user_agent: BROWSER_USER_AGENT.to_string(),
            timeout_secs: 30,
            max_retries: 2,
            retry_base_delay_ms: 500,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ImageConfig {
    /// When false no image is downloaded; N_IMAGES still reports the count.
    pub enabled: bool,
    pub scope: ImageScope,
    pub downloader: DownloaderKind,
    /// Program run by the `wget` downloader.
    pub wget_program: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: ImageScope::Document,
            downloader: DownloaderKind::Http,
            wget_program: "wget".to_string(),
        }
    }
}

/// Which `<img>` elements of an article page are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageScope {
    /// Every image in the page, including navigation and ads.
    #[default]
    Document,
    /// Only images inside the article body elements.
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloaderKind {
    #[default]
    Http,
    Wget,
}

/// Load a [`CrawlerConfig`] from a YAML file.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub fn load_config(path: impl AsRef<Path>) -> Result<CrawlerConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        output_dir = %config.output_dir.display(),
        extra_sites = config.sites.len(),
        "Loaded configuration"
    );
    Ok(config)
}

fn parse_config(raw: &str) -> Result<CrawlerConfig, serde_yaml::Error> {
    // An empty document deserializes as unit, not as an empty mapping.
    if raw.trim().is_empty() {
        return Ok(CrawlerConfig::default());
    }
    serde_yaml::from_str(raw)
}
