//! On-disk article storage.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── <newspaper>/
//! │   └── <article_key>/
//! │       ├── METADATA.txt
//! │       ├── text_news.txt
//! │       └── img/            (only when the article has images)
//! └── .staging/
//!     └── <newspaper>/<article_key>/   (article being written)
//! ```
//!
//! The presence of `<newspaper>/<article_key>` is the only "already
//! downloaded" signal. An article is assembled under `.staging` and renamed
//! into place once everything is written, so an interrupted run never leaves
//! a half-written directory that would be skipped on the next run.

use crate::downloader::ImageDownloader;
use crate::models::{ArticleKey, ArticleRecord};
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const METADATA_FILE: &str = "METADATA.txt";
pub const TEXT_FILE: &str = "text_news.txt";
pub const IMAGE_DIR: &str = "img";
const STAGING_DIR: &str = ".staging";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("article directory {path} already exists")]
    AlreadyExists { path: PathBuf },
    #[error("filesystem error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What [`ArticleStore::save`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArticle {
    pub dir: PathBuf,
    pub images_saved: usize,
    pub images_failed: usize,
}

/// Whether images are downloaded, and by whom.
#[derive(Debug)]
pub enum ImagePolicy<'a, D> {
    Download(&'a D),
    Skip,
}

#[derive(Debug, Clone)]
pub struct ArticleStore {
    root: PathBuf,
}

impl ArticleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    pub fn article_dir(&self, namespace: &str, key: &ArticleKey) -> PathBuf {
        self.namespace_dir(namespace).join(key.as_str())
    }

    fn staging_dir(&self, namespace: &str, key: &ArticleKey) -> PathBuf {
        self.root.join(STAGING_DIR).join(namespace).join(key.as_str())
    }

    /// Create `<root>/<namespace>` if missing.
    pub async fn ensure_namespace(&self, namespace: &str) -> Result<PathBuf, StoreError> {
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir).await.map_err(io_error(&dir))?;
        Ok(dir)
    }

    /// Whether the article was already downloaded.
    pub async fn exists(&self, namespace: &str, key: &ArticleKey) -> bool {
        fs::metadata(self.article_dir(namespace, key))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Persist `record` as `<namespace>/<key>`.
    ///
    /// Files are written under `.staging` and the directory is renamed into
    /// place last, so the article only becomes visible to
    /// [`exists`](Self::exists) once complete.
    ///
    /// # Arguments
    ///
    /// * `namespace` - Newspaper name
    /// * `key` - Storage key of the article
    /// * `record` - Extracted article
    /// * `images` - Download the record's images with a downloader, or skip them
    ///
    /// # Returns
    ///
    /// The final directory and how many images were saved or failed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AlreadyExists`] if the article directory is present;
    ///   callers check [`exists`](Self::exists) first
    /// - [`StoreError::Io`] if a file or directory cannot be written
    ///
    /// Image download failures are logged and counted, never returned.
    #[instrument(level = "info", skip_all, fields(%namespace, %key))]
    pub async fn save<D: ImageDownloader>(
        &self,
        namespace: &str,
        key: &ArticleKey,
        record: &ArticleRecord,
        images: ImagePolicy<'_, D>,
    ) -> Result<SavedArticle, StoreError> {
        let final_dir = self.article_dir(namespace, key);
        if self.exists(namespace, key).await {
            return Err(StoreError::AlreadyExists { path: final_dir });
        }

        let staging = self.staging_dir(namespace, key);
        if fs::metadata(&staging).await.is_ok() {
            debug!(path = %staging.display(), "Removing leftover staging directory");
            fs::remove_dir_all(&staging).await.map_err(io_error(&staging))?;
        }
        fs::create_dir_all(&staging).await.map_err(io_error(&staging))?;

        let metadata_path = staging.join(METADATA_FILE);
        fs::write(&metadata_path, render_metadata(record))
            .await
            .map_err(io_error(&metadata_path))?;

        let text_path = staging.join(TEXT_FILE);
        fs::write(&text_path, record.text())
            .await
            .map_err(io_error(&text_path))?;

        let (images_saved, images_failed) = if record.image_urls.is_empty() {
            (0, 0)
        } else {
            let img_dir = staging.join(IMAGE_DIR);
            fs::create_dir(&img_dir).await.map_err(io_error(&img_dir))?;
            match images {
                ImagePolicy::Download(downloader) => {
                    download_images(downloader, record, &img_dir).await
                }
                ImagePolicy::Skip => (0, 0),
            }
        };

        let namespace_dir = self.namespace_dir(namespace);
        fs::create_dir_all(&namespace_dir)
            .await
            .map_err(io_error(&namespace_dir))?;
        fs::rename(&staging, &final_dir)
            .await
            .map_err(io_error(&final_dir))?;

        info!(
            path = %final_dir.display(),
            title = %truncate_for_log(&record.title, 80),
            paragraphs = record.body_paragraphs.len(),
            images_saved,
            images_failed,
            "Stored article"
        );
        Ok(SavedArticle {
            dir: final_dir,
            images_saved,
            images_failed,
        })
    }
}

/// Sequential best-effort downloads; returns `(saved, failed)`.
async fn download_images<D: ImageDownloader>(
    downloader: &D,
    record: &ArticleRecord,
    img_dir: &Path,
) -> (usize, usize) {
    let base = Url::parse(&record.source_url).ok();
    let outcomes: Vec<bool> = stream::iter(record.image_urls.iter())
        .then(|src| {
            let base = base.as_ref();
            async move {
                let url = match resolve_image_url(base, src) {
                    Some(url) => url,
                    None => {
                        warn!(src = %src, "Image source is not a usable URL; skipping");
                        return false;
                    }
                };
                match downloader.download(&url, img_dir).await {
                    Ok(path) => {
                        debug!(%url, path = %path.display(), "Downloaded image");
                        true
                    }
                    Err(e) => {
                        warn!(%url, error = %e, "Image download failed");
                        false
                    }
                }
            }
        })
        .collect()
        .await;

    let saved = outcomes.iter().filter(|ok| **ok).count();
    (saved, outcomes.len() - saved)
}

/// Resolve an `<img src>` against the article URL. `data:` URIs and
/// unparsable sources yield `None`.
fn resolve_image_url(base: Option<&Url>, src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    let resolved = match Url::parse(src) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(src).ok()?,
        Err(_) => return None,
    };
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// The four-line `METADATA.txt` body.
pub fn render_metadata(record: &ArticleRecord) -> String {
    let mut metadata = String::new();
    let _ = writeln!(
        metadata,
        "DATE EXTRACTED: {}",
        record.extracted_at.format("%m_%d_%y")
    );
    let _ = writeln!(metadata, "TITLE: {}", record.title);
    let _ = writeln!(metadata, "N_IMAGES: {}", record.image_urls.len());
    let _ = writeln!(metadata, "URL: {}", record.source_url);
    metadata
}
