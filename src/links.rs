//! Turning home-page hrefs into article URLs and storage keys.
//!
//! Every site shares the same three operations; the site's [`LinkStyle`]
//! selects the variant:
//!
//! | Operation | `Relative` | `Absolute` |
//! |-----------|------------|------------|
//! | [`SiteProfile::clean_links`] | keep hrefs starting with `/` | unchanged |
//! | [`SiteProfile::article_url`] | home URL + href | href |
//! | [`SiteProfile::storage_key`] | href path, `/` → `_` | href minus home URL prefix, `/` → `_` |
//!
//! The storage key is also the dedup key, so it must be deterministic across
//! runs and must not map two different article URLs to the same directory.

use crate::models::{ArticleKey, LinkStyle, SiteProfile};
use itertools::Itertools;

impl SiteProfile {
    /// Drop hrefs the site's article URL rule cannot handle.
    pub fn clean_links(&self, links: Vec<String>) -> Vec<String> {
        match self.link_style {
            LinkStyle::Relative => links
                .into_iter()
                .filter(|link| link.starts_with('/') && !link.starts_with("//"))
                .collect(),
            LinkStyle::Absolute => links,
        }
    }

    /// Fetchable URL of the article an href points to.
    ///
    /// `Relative` joins the home URL and the href with exactly one `/`.
    pub fn article_url(&self, link: &str) -> String {
        match self.link_style {
            LinkStyle::Relative => format!(
                "{}/{}",
                self.home_url.trim_end_matches('/'),
                link.trim_start_matches('/')
            ),
            LinkStyle::Absolute => link.to_string(),
        }
    }

    /// Directory name under which the article is stored.
    ///
    /// # Arguments
    ///
    /// * `link` - An href that survived [`clean_links`](Self::clean_links)
    ///
    /// # Returns
    ///
    /// A key without `/`, never `.` or `..`. Distinct links give distinct
    /// keys:
    ///
    /// - `Relative`: the escaped href path
    /// - `Absolute` under `home_url`: the escaped remainder after the home URL
    /// - `Absolute` elsewhere: the escaped link behind a `%%` marker, which
    ///   no escaped path can start with
    pub fn storage_key(&self, link: &str) -> ArticleKey {
        let key = match self.link_style {
            LinkStyle::Relative => key_from_path(link),
            LinkStyle::Absolute => match link.strip_prefix(self.home_url.as_str()) {
                Some(rest) => key_from_path(rest),
                None => format!("{FOREIGN_MARKER}{}", key_from_path(link)),
            },
        };
        ArticleKey::new(key)
    }
}

/// Prefix of keys for absolute links outside the home URL. Escaping writes
/// every literal `%` as `%25`, so a path key never contains `%%`.
const FOREIGN_MARKER: &str = "%%";

/// Key of the empty path. A lone `%` is never produced by escaping.
const EMPTY_KEY: &str = "%";

fn key_from_path(path: &str) -> String {
    // `%` and `_` are escaped first so the `/` → `_` substitution stays reversible.
    let escaped = path.replace('%', "%25").replace('_', "%5F");
    let key = escaped.split('/').join("_");

    if key.is_empty() {
        EMPTY_KEY.to_string()
    } else if key.chars().all(|c| c == '.') {
        key.replace('.', "%2E")
    } else {
        key
    }
}
