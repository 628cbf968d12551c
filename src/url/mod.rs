//! URL handling module for Page-Harvest
//!
//! This module provides the URL normalization used to key the crawler's visited-set and
//! to deduplicate collected links, plus host extraction for same-site checks.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{extract_domain, same_site};
pub use normalize::{dedup_key, normalize_url};
