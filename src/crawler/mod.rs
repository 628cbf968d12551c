//! Crawler module: the collaborators and the pagination loop behind every job
//!
//! This module contains:
//! - `PageRenderer` / `HttpRenderer`: fetching (and optionally JS-rendering) a page
//! - `ContentMatcher` / `CssMatcher`: selecting text, links and navigation from a page
//! - Next-page discovery
//! - `PaginationCrawler`: the bounded, sequential page loop

mod matcher;
mod pagination;
mod paginator;
mod renderer;

pub use matcher::{ContentMatcher, CssMatcher, MatchError, MatchRequest, NavLink, PageMatch};
pub use pagination::discover_next_page;
pub use paginator::{CrawlOutcome, CrawlOutput, CrawlProgress, PaginationCrawler, ProgressSink};
pub use renderer::{
    build_http_client, HttpRenderer, PageRenderer, RenderError, RenderRequest, RenderedPage,
};

#[cfg(test)]
pub(crate) use paginator::tests::{chain, StaticRenderer};

use serde::{Deserialize, Serialize};

/// A hyperlink collected from extracted content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// Anchor text, or the raw href when the anchor has none
    pub text: String,
    /// Absolute URL
    pub url: String,
}
