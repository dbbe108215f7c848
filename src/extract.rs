//! HTML extraction driven by a [`SiteProfile`]'s selector table.
//!
//! The profile's `(tag, class)` pairs are compiled once into CSS selectors
//! (`div` + `a_c clearfix` → `div.a_c.clearfix`) when the [`Extractor`] is
//! built, so a broken profile is reported before the crawl touches the
//! network.

use crate::config::{ConfigError, ImageScope};
use crate::models::{ArticleRecord, NO_TITLE, SiteProfile};
use chrono::Local;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("static selector"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("static selector"));
static IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("static selector"));

/// Compiled selectors for one site.
#[derive(Debug)]
pub struct Extractor {
    link: Selector,
    title: Selector,
    body: Selector,
    image_scope: ImageScope,
}

impl Extractor {
    /// Compile the link, title and body selectors of `profile`.
    ///
    /// Each selector is `tag.class1.class2…`, so an element must carry every
    /// class listed in the profile.
    ///
    /// # Arguments
    ///
    /// * `profile` - The newspaper whose selectors are compiled
    /// * `image_scope` - Which `<img>` elements [`article`](Self::article) collects
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSelector`] if a tag name or class does not
    /// form a valid CSS selector.
    pub fn new(profile: &SiteProfile, image_scope: ImageScope) -> Result<Self, ConfigError> {
        Ok(Self {
            link: element_selector(profile, &profile.link_tag_name, &profile.link_tag_class)?,
            title: element_selector(profile, &profile.title_tag_name, &profile.title_tag_class)?,
            body: element_selector(profile, &profile.body_tag_name, &profile.body_tag_class)?,
            image_scope,
        })
    }

    /// hrefs of the first anchor inside every link element, in document order.
    ///
    /// Link elements without an anchor, and anchors without an href, are
    /// skipped.
    #[instrument(level = "debug", skip_all)]
    pub fn links(&self, doc: &Html) -> Vec<String> {
        let mut links = Vec::new();
        for (i, heading) in doc.select(&self.link).enumerate() {
            match heading
                .select(&ANCHOR)
                .next()
                .and_then(|a| a.value().attr("href"))
            {
                Some(href) => links.push(href.to_string()),
                None => debug!(index = i, "Link element has no anchor with href; skipping"),
            }
        }
        links
    }

    /// Title, body paragraphs and image sources of an article page.
    #[instrument(level = "debug", skip_all, fields(%source_url))]
    pub fn article(&self, doc: &Html, source_url: &str) -> ArticleRecord {
        let title = doc
            .select(&self.title)
            .next()
            .map(|el| el.text().collect::<String>().split_whitespace().join(" "))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| {
                debug!("No title element; using placeholder");
                NO_TITLE.to_string()
            });

        let bodies: Vec<ElementRef<'_>> = doc.select(&self.body).collect();

        let body_paragraphs = bodies
            .iter()
            .flat_map(|body| body.select(&PARAGRAPH))
            .map(|p| p.text().collect::<String>())
            .collect::<Vec<_>>();

        let image_urls: Vec<String> = match self.image_scope {
            ImageScope::Document => doc.select(&IMAGE).filter_map(image_src).collect(),
            ImageScope::Body => bodies
                .iter()
                .flat_map(|body| body.select(&IMAGE))
                .filter_map(image_src)
                .collect(),
        };

        debug!(
            %title,
            paragraphs = body_paragraphs.len(),
            images = image_urls.len(),
            "Extracted article"
        );

        ArticleRecord {
            title,
            body_paragraphs,
            image_urls,
            source_url: source_url.to_string(),
            extracted_at: Local::now().date_naive(),
        }
    }
}

fn image_src(img: ElementRef<'_>) -> Option<String> {
    img.value().attr("src").map(str::to_string)
}

fn element_selector(profile: &SiteProfile, tag: &str, class: &str) -> Result<Selector, ConfigError> {
    let mut css = tag.trim().to_string();
    for class in class.split_whitespace() {
        css.push('.');
        css.push_str(class);
    }
    Selector::parse(&css).map_err(|e| ConfigError::InvalidSelector {
        site: profile.name.clone(),
        selector: css.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::{SiteRegistry, elpais};

    fn extractor(scope: ImageScope) -> Extractor {
        Extractor::new(&elpais::profile(), scope).unwrap()
    }

    #[test]
    fn test_every_builtin_profile_compiles() {
        let registry = SiteRegistry::builtin();
        for name in registry.names() {
            let profile = registry.get(name).unwrap();
            assert!(Extractor::new(profile, ImageScope::Document).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_invalid_selector_is_config_error() {
        let mut profile = elpais::profile();
        profile.title_tag_name = "h1[".to_string();
        match Extractor::new(&profile, ImageScope::Document) {
            Err(ConfigError::InvalidSelector { site, selector, .. }) => {
                assert_eq!(site, "elpais");
                assert_eq!(selector, "h1[.a_t");
            }
            other => panic!("expected InvalidSelector, got {other:?}"),
        }
    }

    #[test]
    fn test_links_skip_headers_without_href() {
        // 5 headers; one without an anchor, one with an anchor lacking href.
        let html = r#"
            <html><body>
              <h2 class="c_t"><a href="/a/1">One</a></h2>
              <h2 class="c_t">No anchor</h2>
              <h2 class="c_t"><span><a href="/a/2">Two</a></span><a href="/ignored">x</a></h2>
              <h2 class="c_t"><a name="anchor-only">Three</a></h2>
              <h2 class="other"><a href="/not-a-headline">Other</a></h2>
              <h2 class="c_t extra"><a href="https://elpais.com/a/3">Four</a></h2>
            </body></html>
        "#;
        let doc = Html::parse_document(html);
        let links = extractor(ImageScope::Document).links(&doc);
        assert_eq!(links, vec!["/a/1", "/a/2", "https://elpais.com/a/3"]);
    }

    #[test]
    fn test_links_empty_page() {
        let doc = Html::parse_document("<html><body></body></html>");
        assert!(extractor(ImageScope::Document).links(&doc).is_empty());
    }

    #[test]
    fn test_article_fields() {
        let html = r#"
            <html><body>
              <img src="/logo.png">
              <h1 class="a_t">
                Breaking   news
              </h1>
              <div class="a_c clearfix">
                <p>First paragraph.</p>
                <figure><img src="https://img.example/photo.jpg"></figure>
                <p>Second <b>bold</b> paragraph.</p>
              </div>
              <p>Outside the body.</p>
              <div class="a_c clearfix"><p>Third.</p></div>
              <img alt="no source">
            </body></html>
        "#;
        let doc = Html::parse_document(html);
        let record = extractor(ImageScope::Document).article(&doc, "https://elpais.com/a/1");

        assert_eq!(record.title, "Breaking news");
        assert_eq!(
            record.body_paragraphs,
            vec!["First paragraph.", "Second bold paragraph.", "Third."]
        );
        assert_eq!(
            record.image_urls,
            vec!["/logo.png", "https://img.example/photo.jpg"]
        );
        assert_eq!(record.source_url, "https://elpais.com/a/1");
        assert_eq!(record.extracted_at, Local::now().date_naive());
    }

    #[test]
    fn test_article_body_image_scope() {
        let html = r#"
            <img src="/logo.png">
            <div class="a_c clearfix"><p>Text</p><img src="/photo.jpg"></div>
        "#;
        let doc = Html::parse_document(html);
        let record = extractor(ImageScope::Body).article(&doc, "https://elpais.com/a/1");
        assert_eq!(record.image_urls, vec!["/photo.jpg"]);
    }

    #[test]
    fn test_document_image_scope_includes_page_chrome() {
        let html = r#"
            <img src="/logo.png">
            <div class="a_c clearfix"><p>Text</p><img src="/photo.jpg"><img alt="no src"></div>
        "#;
        let doc = Html::parse_document(html);
        let record = extractor(ImageScope::Document).article(&doc, "https://elpais.com/a/1");
        assert_eq!(record.image_urls, vec!["/logo.png", "/photo.jpg"]);
    }

    #[test]
    fn test_missing_title_uses_placeholder() {
        let doc = Html::parse_document(r#"<div class="a_c clearfix"><p>Body</p></div>"#);
        let record = extractor(ImageScope::Document).article(&doc, "https://elpais.com/a/1");
        assert_eq!(record.title, NO_TITLE);
        assert_eq!(record.body_paragraphs, vec!["Body"]);
    }

    #[test]
    fn test_empty_title_uses_placeholder() {
        let doc = Html::parse_document(r#"<h1 class="a_t">  </h1>"#);
        let record = extractor(ImageScope::Document).article(&doc, "https://elpais.com/a/1");
        assert_eq!(record.title, NO_TITLE);
        assert!(record.body_paragraphs.is_empty());
        assert!(record.image_urls.is_empty());
    }
}
