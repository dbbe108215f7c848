//! JSON run report.
//!
//! When `--report <path>` is given, the [`CrawlSummary`] of the run is written
//! there as pretty-printed JSON so schedulers can inspect how a crawl went
//! without parsing logs.

use crate::models::CrawlSummary;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write a [`CrawlSummary`] to `path`, creating parent directories.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_summary(summary: &CrawlSummary, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(summary)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create report dir");
            return Err(e.into());
        }
    }

    fs::write(path, json).await?;
    info!("Wrote crawl report");
    Ok(())
}
