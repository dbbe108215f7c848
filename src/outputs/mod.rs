//! Output generation for run reports.
//!
//! # Submodules
//!
//! - [`json`]: Writes a [`CrawlSummary`](crate::models::CrawlSummary) to a JSON file

pub mod json;
