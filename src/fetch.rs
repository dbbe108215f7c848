//! Page fetching with exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`FetchHtml`]: core trait; GET a page and parse it into a document tree
//! - [`HttpFetcher`]: `reqwest` implementation honouring the site's header needs
//! - [`RetryFetch`]: decorator that retries transient failures of any [`FetchHtml`]
//!
//! # Retry Strategy
//!
//! Only network errors, HTTP 429 and HTTP 5xx are retried. The delay before
//! retry `n` is `min(base_delay * 2^(n-1), 30s)` plus 0-250ms of jitter.

use crate::config::FetchConfig;
use crate::models::SiteProfile;
use rand::{Rng, rng};
use reqwest::header::USER_AGENT;
use scraper::Html;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Failure to retrieve a page. Every variant names the URL involved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("could not read the body of {url}: {source}")]
    Body {
        url: String,
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::InvalidUrl { url, .. }
            | FetchError::Request { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Body { url, .. } => url,
        }
    }

    /// Whether trying again later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Request { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::InvalidUrl { .. } | FetchError::Body { .. } => false,
        }
    }
}

/// Trait for retrieving HTML pages.
pub trait FetchHtml {
    /// GET `url` and return the response body.
    async fn fetch_text(&self, url: &str, profile: &SiteProfile) -> Result<String, FetchError>;

    /// GET `url` and parse it into a traversable document.
    async fn fetch(&self, url: &str, profile: &SiteProfile) -> Result<Html, FetchError> {
        let body = self.fetch_text(url, profile).await?;
        Ok(Html::parse_document(&body))
    }
}

/// Reject anything that is not an absolute http(s) URL before any I/O.
pub fn validate_url(url: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    if url.trim().is_empty() {
        return Err(invalid("URL is empty".to_string()));
    }
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

/// [`FetchHtml`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    browser_user_agent: String,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            browser_user_agent: config.browser_user_agent.clone(),
        })
    }

    /// The underlying client, shared with the image downloader.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl FetchHtml for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(%url, site = %profile.name))]
    async fn fetch_text(&self, url: &str, profile: &SiteProfile) -> Result<String, FetchError> {
        let parsed = validate_url(url)?;
        let t0 = Instant::now();

        let mut request = self.client.get(parsed);
        if profile.requires_custom_headers {
            request = request.header(USER_AGENT, &self.browser_user_agent);
        }

        let response = request.send().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`FetchHtml`].
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: FetchHtml,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = (attempt - 1).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + StdDuration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> FetchHtml for RetryFetch<T>
where
    T: FetchHtml,
{
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch_text(&self, url: &str, profile: &SiteProfile) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch_text(url, profile).await {
                Ok(body) => return Ok(body),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BROWSER_USER_AGENT;
    use crate::scrapers::{abc, elpais};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&FetchConfig::default()).unwrap()
    }

    fn no_retry<T: FetchHtml>(inner: T) -> RetryFetch<T> {
        RetryFetch::new(inner, 0, StdDuration::from_millis(1))
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://elpais.com/a/1").is_ok());
        assert!(matches!(
            validate_url(""),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_url("/a/1"),
            Err(FetchError::InvalidUrl { .. })
        ));
        let err = validate_url("ftp://elpais.com/a").unwrap_err();
        assert_eq!(err.url(), "ftp://elpais.com/a");
    }

    #[test]
    fn test_transient_classification() {
        let status = |status| FetchError::Status {
            url: "https://x.example".to_string(),
            status,
        };
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(!validate_url("").unwrap_err().is_transient());
    }

    #[test]
    fn test_backoff_is_capped() {
        let retry = RetryFetch::new(fetcher(), 40, StdDuration::from_secs(1));
        assert!(retry.backoff(1) >= StdDuration::from_secs(1));
        assert!(retry.backoff(1) <= StdDuration::from_millis(1250));
        assert!(retry.backoff(40) <= StdDuration::from_millis(30_250));
    }

    #[tokio::test]
    async fn test_fetch_parses_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<h2 class="c_t"><a href="/a/1">x</a></h2>"#),
            )
            .mount(&server)
            .await;

        let doc = fetcher()
            .fetch(&format!("{}/", server.uri()), &elpais::profile())
            .await
            .unwrap();
        let h2 = scraper::Selector::parse("h2.c_t a").unwrap();
        assert_eq!(doc.select(&h2).count(), 1);
    }

    #[tokio::test]
    async fn test_browser_user_agent_only_when_required() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>ok</p>"))
            .mount(&server)
            .await;

        let url = format!("{}/page", server.uri());
        fetcher().fetch_text(&url, &abc::profile()).await.unwrap();
        fetcher().fetch_text(&url, &elpais::profile()).await.unwrap();

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        let agent = |r: &Request| {
            r.headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        assert_eq!(agent(&requests[0]).as_deref(), Some(BROWSER_USER_AGENT));
        assert_ne!(agent(&requests[1]).as_deref(), Some(BROWSER_USER_AGENT));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error_with_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/missing", server.uri());
        let err = fetcher()
            .fetch_text(&url, &elpais::profile())
            .await
            .unwrap_err();
        match &err {
            FetchError::Status { status, .. } => assert_eq!(*status, 404),
            other => panic!("expected Status, got {other:?}"),
        }
        assert_eq!(err.url(), url);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>ok</p>"))
            .mount(&server)
            .await;

        let retry = RetryFetch::new(fetcher(), 2, StdDuration::from_millis(1));
        let body = retry
            .fetch_text(&server.uri(), &elpais::profile())
            .await
            .unwrap();
        assert_eq!(body, "<p>ok</p>");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_does_not_repeat_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let retry = RetryFetch::new(fetcher(), 3, StdDuration::from_millis(1));
        let err = retry
            .fetch_text(&server.uri(), &elpais::profile())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let err = no_retry(fetcher())
            .fetch_text(&server.uri(), &elpais::profile())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 500, .. }));
    }
}
