//! Image acquisition for stored articles.
//!
//! The store hands every image URL and the article's `img/` directory to an
//! [`ImageDownloader`]. Two implementations exist:
//!
//! - [`HttpDownloader`]: fetches the image in-process with `reqwest`
//! - [`WgetDownloader`]: shells out to `wget <url> -P <dir>`
//!
//! [`Downloader`] picks one of them at runtime from the config.

use crate::config::{DownloaderKind, ImageConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, instrument};
use url::Url;

static UNSAFE_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^A-Za-z0-9._-]+"#).expect("static regex"));

const FALLBACK_FILE_NAME: &str = "image";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid image URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request for {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("`{program}` failed for {url}: {reason}")]
    Command {
        program: String,
        url: String,
        reason: String,
    },
}

/// Downloads a single image into a directory.
pub trait ImageDownloader {
    /// Save `url` inside `dest_dir`, returning the path written when known.
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, DownloadError>;
}

/// In-process downloader. File names follow wget: the last path segment,
/// with `.1`, `.2`, … appended when the name is already taken.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ImageDownloader for HttpDownloader {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, DownloadError> {
        let parsed = Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|source| DownloadError::Request {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|source| DownloadError::Request {
                url: url.to_string(),
                source,
            })?;

        let path = unused_path(dest_dir, &file_name_for(&parsed)).await;
        fs::write(&path, &bytes)
            .await
            .map_err(|source| DownloadError::Write {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), bytes = bytes.len(), "Saved image");
        Ok(path)
    }
}

/// Runs an external `wget`-compatible program per image.
#[derive(Debug, Clone)]
pub struct WgetDownloader {
    program: String,
}

impl WgetDownloader {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ImageDownloader for WgetDownloader {
    #[instrument(level = "debug", skip_all, fields(%url, program = %self.program))]
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, DownloadError> {
        let failed = |reason: String| DownloadError::Command {
            program: self.program.clone(),
            url: url.to_string(),
            reason,
        };

        let output = Command::new(&self.program)
            .arg("-q")
            .arg(url)
            .arg("-P")
            .arg(dest_dir)
            .output()
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!("{} {}", output.status, stderr.trim())));
        }
        Ok(dest_dir.to_path_buf())
    }
}

/// Downloader chosen from [`ImageConfig::downloader`].
#[derive(Debug, Clone)]
pub enum Downloader {
    Http(HttpDownloader),
    Wget(WgetDownloader),
}

impl Downloader {
    pub fn from_config(config: &ImageConfig, client: reqwest::Client) -> Self {
        match config.downloader {
            DownloaderKind::Http => Downloader::Http(HttpDownloader::new(client)),
            DownloaderKind::Wget => Downloader::Wget(WgetDownloader::new(&config.wget_program)),
        }
    }
}

impl ImageDownloader for Downloader {
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, DownloadError> {
        match self {
            Downloader::Http(d) => d.download(url, dest_dir).await,
            Downloader::Wget(d) => d.download(url, dest_dir).await,
        }
    }
}

/// Local file name for an image URL: last path segment, percent-decoded,
/// with anything outside `[A-Za-z0-9._-]` replaced by `_`.
pub fn file_name_for(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let name = UNSAFE_FILE_CHARS.replace_all(&decoded, "_");
    let name = name.trim_matches('.');
    if name.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        name.to_string()
    }
}

async fn unused_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }
    let mut n = 1usize;
    loop {
        let candidate = dir.join(format!("{name}.{n}"));
        if !fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn name(url: &str) -> String {
        file_name_for(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_file_name_for() {
        assert_eq!(name("https://img.example/a/b/photo.jpg"), "photo.jpg");
        assert_eq!(name("https://img.example/a/foto%20grande.jpg?w=300"), "foto_grande.jpg");
        assert_eq!(name("https://img.example/a/..%2F..%2Fetc"), "_.._etc");
        assert_eq!(name("https://img.example/"), FALLBACK_FILE_NAME);
        assert_eq!(name("https://img.example/%2E%2E"), FALLBACK_FILE_NAME);
    }

    #[test]
    fn test_from_config() {
        let mut config = ImageConfig::default();
        assert!(matches!(
            Downloader::from_config(&config, reqwest::Client::new()),
            Downloader::Http(_)
        ));
        config.downloader = DownloaderKind::Wget;
        assert!(matches!(
            Downloader::from_config(&config, reqwest::Client::new()),
            Downloader::Wget(_)
        ));
    }

    #[tokio::test]
    async fn test_http_download_keeps_existing_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/photo.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let downloader = HttpDownloader::new(reqwest::Client::new());
        let url = format!("{}/img/photo.jpg", server.uri());

        let first = downloader.download(&url, tmp.path()).await.unwrap();
        let second = downloader.download(&url, tmp.path()).await.unwrap();

        assert_eq!(first, tmp.path().join("photo.jpg"));
        assert_eq!(second, tmp.path().join("photo.jpg.1"));
        assert_eq!(std::fs::read(&first).unwrap(), vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn test_http_download_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let downloader = HttpDownloader::new(reqwest::Client::new());
        let err = downloader
            .download(&format!("{}/gone.png", server.uri()), tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Status { status: 404, .. }));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_wget_missing_program_is_error() {
        let tmp = TempDir::new().unwrap();
        let downloader = WgetDownloader::new("definitely-not-a-real-wget-binary");
        let err = downloader
            .download("https://img.example/photo.jpg", tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Command { .. }));
    }
}
