//! El País (<https://elpais.com>).
//!
//! Home page headlines are `h2.c_t` wrapping site-relative links, so article
//! URLs are built by prefixing the home URL.

use crate::models::{LinkStyle, SiteProfile};

pub const NAME: &str = "elpais";

pub fn profile() -> SiteProfile {
    SiteProfile {
        name: NAME.to_string(),
        home_url: "https://elpais.com".to_string(),
        link_tag_name: "h2".to_string(),
        link_tag_class: "c_t".to_string(),
        title_tag_name: "h1".to_string(),
        title_tag_class: "a_t".to_string(),
        body_tag_name: "div".to_string(),
        body_tag_class: "a_c clearfix".to_string(),
        requires_custom_headers: false,
        link_style: LinkStyle::Relative,
    }
}
