//! El Mundo (<https://www.elmundo.es>).
//!
//! Headline groups carry fully-qualified links; the storage key drops the
//! home URL prefix.

use crate::models::{LinkStyle, SiteProfile};

pub const NAME: &str = "elmundo";

pub fn profile() -> SiteProfile {
    SiteProfile {
        name: NAME.to_string(),
        home_url: "https://www.elmundo.es/".to_string(),
        link_tag_name: "header".to_string(),
        link_tag_class: "ue-c-cover-content__headline-group".to_string(),
        title_tag_name: "h1".to_string(),
        title_tag_class: "ue-c-article__headline js-headline".to_string(),
        body_tag_name: "div".to_string(),
        body_tag_class: "ue-l-article__body ue-c-article__body".to_string(),
        requires_custom_headers: false,
        link_style: LinkStyle::Absolute,
    }
}
