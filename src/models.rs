//! Data models shared by the crawl pipeline.
//!
//! - [`SiteProfile`]: per-newspaper selector configuration
//! - [`LinkStyle`]: how a newspaper writes the links on its home page
//! - [`ArticleKey`]: storage directory name and dedup key of one article
//! - [`ArticleRecord`]: what was extracted from one article page
//! - [`CrawlSummary`]: counters for a single crawl run

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Title written to the metadata when the article page has no title element.
pub const NO_TITLE: &str = "NoTitleAvailable";

/// How a newspaper publishes the article links found on its home page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStyle {
    /// Site-relative hrefs such as `/espana/2021-05-01/story.html`.
    #[default]
    Relative,
    /// Fully-qualified hrefs such as `https://www.elmundo.es/espana/story.html`.
    Absolute,
}

/// Selector table and base URL describing how to crawl one newspaper.
///
/// A tag class may hold several space-separated classes; an element must
/// carry all of them to match.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SiteProfile {
    /// Unique identifier, also the storage namespace.
    pub name: String,
    /// Home page URL the links are discovered from.
    pub home_url: String,
    /// Element wrapping each article link on the home page.
    pub link_tag_name: String,
    pub link_tag_class: String,
    /// Element holding the article title.
    pub title_tag_name: String,
    pub title_tag_class: String,
    /// Element(s) whose paragraphs form the article body.
    pub body_tag_name: String,
    pub body_tag_class: String,
    /// Send a browser User-Agent; some sites reject default client identifiers.
    #[serde(default)]
    pub requires_custom_headers: bool,
    #[serde(default)]
    pub link_style: LinkStyle,
}

/// Filesystem-safe identifier of one article inside a newspaper namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ArticleKey(String);

impl ArticleKey {
    pub(crate) fn new(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content extracted from a single article page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    /// Headline, or [`NO_TITLE`] when the page has none.
    pub title: String,
    /// Paragraph texts in document order.
    pub body_paragraphs: Vec<String>,
    /// `src` attributes of the page images in document order, as found.
    pub image_urls: Vec<String>,
    /// URL the article was fetched from.
    pub source_url: String,
    pub extracted_at: NaiveDate,
}

impl ArticleRecord {
    /// Body text as stored in `text_news.txt`: paragraphs joined with no separator.
    pub fn text(&self) -> String {
        self.body_paragraphs.concat()
    }
}

/// Outcome of one crawl run.
///
/// `processed()` counts every link the pacing policy saw, whether it was
/// downloaded, already on disk, or failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub newspaper: String,
    pub home_url: String,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    /// Links found on the home page before cleaning.
    pub links_found: usize,
    /// Links left after the site's cleaning rule.
    pub links_kept: usize,
    pub downloaded: usize,
    pub already_present: usize,
    pub failed: usize,
    pub images_saved: usize,
    pub images_failed: usize,
    pub pauses: usize,
}

impl CrawlSummary {
    pub fn new(profile: &SiteProfile) -> Self {
        Self {
            newspaper: profile.name.clone(),
            home_url: profile.home_url.clone(),
            started_at: Local::now(),
            finished_at: None,
            links_found: 0,
            links_kept: 0,
            downloaded: 0,
            already_present: 0,
            failed: 0,
            images_saved: 0,
            images_failed: 0,
            pauses: 0,
        }
    }

    pub fn processed(&self) -> usize {
        self.downloaded + self.already_present + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_text_concatenates_without_separator() {
        let record = ArticleRecord {
            title: "Title".to_string(),
            body_paragraphs: vec!["First.".to_string(), "Second.".to_string()],
            image_urls: vec![],
            source_url: "https://example.com/a/1".to_string(),
            extracted_at: NaiveDate::from_ymd_opt(2021, 5, 1).unwrap(),
        };
        assert_eq!(record.text(), "First.Second.");
    }

    #[test]
    fn test_site_profile_yaml_defaults() {
        let yaml = r#"
name: example
home_url: https://example.com
link_tag_name: h2
link_tag_class: headline
title_tag_name: h1
title_tag_class: title
body_tag_name: div
body_tag_class: body
"#;
        let profile: SiteProfile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(profile.name, "example");
        assert!(!profile.requires_custom_headers);
        assert_eq!(profile.link_style, LinkStyle::Relative);
    }

    #[test]
    fn test_link_style_lowercase() {
        let style: LinkStyle = serde_yaml::from_str("absolute").unwrap();
        assert_eq!(style, LinkStyle::Absolute);
    }

    #[test]
    fn test_summary_serialization() {
        let profile = SiteProfile {
            name: "example".to_string(),
            home_url: "https://example.com".to_string(),
            link_tag_name: "h2".to_string(),
            link_tag_class: "c_t".to_string(),
            title_tag_name: "h1".to_string(),
            title_tag_class: "a_t".to_string(),
            body_tag_name: "div".to_string(),
            body_tag_class: "a_c".to_string(),
            requires_custom_headers: false,
            link_style: LinkStyle::Relative,
        };
        let mut summary = CrawlSummary::new(&profile);
        summary.downloaded = 2;
        summary.already_present = 1;
        assert_eq!(summary.processed(), 3);

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"newspaper\":\"example\""));
        assert!(json.contains("\"downloaded\":2"));
    }
}
