//! Supported newspapers and the registry that resolves them by name.
//!
//! Each submodule describes one newspaper as a [`SiteProfile`]: where its
//! home page lives, which elements hold the article links, title and body,
//! and how its links are written ([`LinkStyle`](crate::models::LinkStyle)).
//! The crawl itself is shared by every site (see [`crate::pipeline`]), so
//! adding a newspaper only takes a new profile here or in the config file.
//!
//! # Supported Sources
//!
//! | Source | Module | Links | Notes |
//! |--------|--------|-------|-------|
//! | El País | [`elpais`] | relative | |
//! | El Mundo | [`elmundo`] | absolute | |
//! | ABC | [`abc`] | relative | needs a browser User-Agent |

pub mod abc;
pub mod elmundo;
pub mod elpais;

use crate::config::ConfigError;
use crate::models::SiteProfile;
use once_cell::sync::Lazy;
use std::fmt::Write;
use tracing::{debug, instrument};
use url::Url;

static BUILTIN: Lazy<Vec<SiteProfile>> =
    Lazy::new(|| vec![elpais::profile(), elmundo::profile(), abc::profile()]);

/// Lookup table from newspaper identifier to [`SiteProfile`].
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    sites: Vec<SiteProfile>,
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SiteRegistry {
    /// The newspapers shipped with the crawler.
    pub fn builtin() -> Self {
        Self {
            sites: BUILTIN.clone(),
        }
    }

    /// Built-in newspapers plus `extra`. An extra site whose name matches a
    /// built-in replaces it; new names are appended in the given order.
    #[instrument(level = "debug", skip_all)]
    pub fn with_sites<I>(extra: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = SiteProfile>,
    {
        let mut registry = Self::builtin();
        for site in extra {
            validate(&site)?;
            match registry
                .sites
                .iter_mut()
                .find(|known| known.name.eq_ignore_ascii_case(&site.name))
            {
                Some(known) => {
                    debug!(site = %site.name, "Config site replaces built-in profile");
                    *known = site;
                }
                None => {
                    debug!(site = %site.name, "Config site added");
                    registry.sites.push(site);
                }
            }
        }
        Ok(registry)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sites.iter().map(|s| s.name.as_str())
    }

    /// Resolve a newspaper identifier. Surrounding whitespace and ASCII case
    /// are ignored so menu input can be passed through directly.
    pub fn get(&self, name: &str) -> Result<&SiteProfile, ConfigError> {
        let wanted = name.trim();
        self.sites
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigError::UnknownNewspaper {
                name: wanted.to_string(),
                available: self.names().map(str::to_string).collect(),
            })
    }

    /// Numbered list of the supported newspapers, as printed by the CLI.
    pub fn menu(&self) -> String {
        let mut menu = String::from("The newspapers available are:\n");
        for (i, name) in self.names().enumerate() {
            let _ = writeln!(menu, "{}.- {}", i + 1, name);
        }
        menu.push_str("Please, select one from the list above.");
        menu
    }
}

fn validate(site: &SiteProfile) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidSite {
        name: site.name.clone(),
        reason: reason.to_string(),
    };

    if site.name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    // The name is used as a directory; dot names are reserved for staging.
    if site.name.contains(['/', '\\']) || site.name.starts_with('.') {
        return Err(invalid("name must be a plain directory name"));
    }
    match Url::parse(&site.home_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => return Err(invalid("home_url must be an absolute http(s) URL")),
    }
    for tag in [&site.link_tag_name, &site.title_tag_name, &site.body_tag_name] {
        if tag.trim().is_empty() {
            return Err(invalid("tag names must not be empty"));
        }
    }
    Ok(())
}
