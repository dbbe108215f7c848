//! ABC (<https://www.abc.es>).
//!
//! Rejects requests without a browser User-Agent. Fully-qualified links on
//! the home page point outside the paper and are dropped by cleaning.

use crate::models::{LinkStyle, SiteProfile};

pub const NAME: &str = "abc";

pub fn profile() -> SiteProfile {
    SiteProfile {
        name: NAME.to_string(),
        home_url: "https://www.abc.es/".to_string(),
        link_tag_name: "h3".to_string(),
        link_tag_class: "titular lead-title".to_string(),
        title_tag_name: "span".to_string(),
        title_tag_class: "titular".to_string(),
        body_tag_name: "span".to_string(),
        body_tag_class: "cuerpo-texto".to_string(),
        requires_custom_headers: true,
        link_style: LinkStyle::Relative,
    }
}
