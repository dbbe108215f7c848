//! The crawl routine shared by every newspaper.
//!
//! ```text
//! FetchingHome ─► Discovering ─► for each link:
//!                                  CheckDedup ─┬─ stored ──────────────────────────┐
//!                                              └─ FetchingArticle ─► Extracting ─► Persisting
//!                                  Pacing ◄────────────────────────────────────────┘
//!                                Done
//! ```
//!
//! Only the home page fetch aborts a run. A failed article is logged and
//! left out; since nothing was stored for it, the next run tries it again.

use crate::config::{ConfigError, CrawlerConfig, ImageScope, PacingConfig};
use crate::downloader::ImageDownloader;
use crate::extract::Extractor;
use crate::fetch::{FetchError, FetchHtml};
use crate::models::{ArticleKey, CrawlSummary, SiteProfile};
use crate::scrapers::SiteRegistry;
use crate::store::{ArticleStore, ImagePolicy, SavedArticle, StoreError};
use chrono::Local;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("could not fetch the home page: {0}")]
    HomePage(#[source] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
enum ArticleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Run settings taken from [`CrawlerConfig`].
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub pacing: PacingConfig,
    pub image_scope: ImageScope,
    pub download_images: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self::from(&CrawlerConfig::default())
    }
}

impl From<&CrawlerConfig> for CrawlOptions {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            pacing: config.pacing.clone(),
            image_scope: config.images.scope,
            download_images: config.images.enabled,
        }
    }
}

/// Counts processed links and says when to pause.
///
/// The counter starts at 1 and a pause is due after link `n` when
/// `n > 1 && n % every == 0`, so with `every = 30` the first pause comes
/// right after the 30th link.
#[derive(Debug, Clone)]
pub struct Pacer {
    counter: u64,
    every: u64,
    pause: Duration,
}

impl Pacer {
    pub fn new(every: u64, pause: Duration) -> Self {
        Self {
            counter: 1,
            every,
            pause,
        }
    }

    /// Record one processed link; returns the pause owed, if any.
    pub fn record(&mut self) -> Option<Duration> {
        let due = self.every > 0 && self.counter > 1 && self.counter % self.every == 0;
        self.counter += 1;
        due.then_some(self.pause)
    }
}

pub struct CrawlPipeline<F, D> {
    profile: SiteProfile,
    extractor: Extractor,
    options: CrawlOptions,
    fetcher: F,
    downloader: D,
    store: ArticleStore,
}

impl<F, D> CrawlPipeline<F, D>
where
    F: FetchHtml,
    D: ImageDownloader,
{
    /// Compile the profile's selectors. No network access happens here.
    pub fn new(
        profile: SiteProfile,
        options: CrawlOptions,
        fetcher: F,
        downloader: D,
        store: ArticleStore,
    ) -> Result<Self, ConfigError> {
        let extractor = Extractor::new(&profile, options.image_scope)?;
        Ok(Self {
            profile,
            extractor,
            options,
            fetcher,
            downloader,
            store,
        })
    }

    /// Build the pipeline for the newspaper called `name`.
    pub fn for_site(
        registry: &SiteRegistry,
        name: &str,
        options: CrawlOptions,
        fetcher: F,
        downloader: D,
        store: ArticleStore,
    ) -> Result<Self, ConfigError> {
        let profile = registry.get(name)?.clone();
        Self::new(profile, options, fetcher, downloader, store)
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    /// Crawl the home page and store every article not stored yet.
    #[instrument(level = "info", skip_all, fields(site = %self.profile.name))]
    pub async fn run(&self) -> Result<CrawlSummary, CrawlError> {
        let mut summary = CrawlSummary::new(&self.profile);
        let namespace = self.profile.name.as_str();

        info!(url = %self.profile.home_url, "Fetching home page");
        let raw_links = {
            let home = self
                .fetcher
                .fetch(&self.profile.home_url, &self.profile)
                .await
                .map_err(CrawlError::HomePage)?;
            self.extractor.links(&home)
        };
        summary.links_found = raw_links.len();

        let links = self.profile.clean_links(raw_links);
        summary.links_kept = links.len();
        info!(
            found = summary.links_found,
            kept = summary.links_kept,
            "Discovered article links"
        );

        self.store.ensure_namespace(namespace).await?;
        let mut pacer = Pacer::new(self.options.pacing.every, self.options.pacing.pause());

        for link in &links {
            let key = self.profile.storage_key(link);
            if self.store.exists(namespace, &key).await {
                debug!(%link, %key, "Already downloaded; skipping");
                summary.already_present += 1;
            } else {
                let url = self.profile.article_url(link);
                match self.process_article(&key, &url).await {
                    Ok(saved) => {
                        summary.downloaded += 1;
                        summary.images_saved += saved.images_saved;
                        summary.images_failed += saved.images_failed;
                    }
                    Err(ArticleError::Fetch(e)) => {
                        warn!(url = %e.url(), error = %e, "Article fetch failed; skipping");
                        summary.failed += 1;
                    }
                    Err(ArticleError::Store(e)) => {
                        error!(%url, %key, error = %e, "Could not store article; skipping");
                        summary.failed += 1;
                    }
                }
            }

            if let Some(pause) = pacer.record() {
                info!(
                    processed = summary.processed(),
                    ?pause,
                    "Pausing to avoid remote rate limiting"
                );
                summary.pauses += 1;
                sleep(pause).await;
            }
        }

        summary.finished_at = Some(Local::now());
        info!(
            downloaded = summary.downloaded,
            already_present = summary.already_present,
            failed = summary.failed,
            images_saved = summary.images_saved,
            images_failed = summary.images_failed,
            pauses = summary.pauses,
            "Crawl finished"
        );
        Ok(summary)
    }

    #[instrument(level = "info", skip_all, fields(%url))]
    async fn process_article(&self, key: &ArticleKey, url: &str) -> Result<SavedArticle, ArticleError> {
        let record = {
            let doc = self.fetcher.fetch(url, &self.profile).await?;
            self.extractor.article(&doc, url)
        };

        let images = if self.options.download_images {
            ImagePolicy::Download(&self.downloader)
        } else {
            ImagePolicy::Skip
        };
        Ok(self
            .store
            .save(&self.profile.name, key, &record, images)
            .await?)
    }
}
