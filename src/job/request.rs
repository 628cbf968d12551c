use crate::JobError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Largest page budget a paginated request may ask for
pub const MAX_PAGES_LIMIT: u32 = 1000;

/// Longest JavaScript settle time a request may ask for (seconds)
pub const MAX_WAIT_TIME_SECS: f64 = 60.0;

fn default_max_pages() -> u32 {
    1
}

/// Parameters of one extraction job
///
/// A request is an immutable snapshot once a job is created. Unknown fields are
/// rejected when deserializing, so malformed submissions fail at the
/// `InvalidRequest` boundary instead of somewhere inside the crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionRequest {
    /// Page to start extracting from
    pub url: String,

    /// CSS selector for the content to extract; the whole body when absent
    #[serde(default)]
    pub selector: Option<String>,

    /// Collect hyperlinks found inside the selected content
    #[serde(default)]
    pub include_links: bool,

    /// Render the page with JavaScript before matching
    #[serde(default)]
    pub use_js: bool,

    /// Seconds to let JavaScript settle before the page is captured
    #[serde(default)]
    pub wait_time: f64,

    /// Follow "next page" links
    #[serde(default)]
    pub has_pagination: bool,

    /// Page budget when `has_pagination` is set
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl ExtractionRequest {
    /// Creates a request for a single page with every option at its default
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            selector: None,
            include_links: false,
            use_js: false,
            wait_time: 0.0,
            has_pagination: false,
            max_pages: default_max_pages(),
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_links(mut self) -> Self {
        self.include_links = true;
        self
    }

    pub fn with_js(mut self, wait_time: f64) -> Self {
        self.use_js = true;
        self.wait_time = wait_time;
        self
    }

    pub fn with_pagination(mut self, max_pages: u32) -> Self {
        self.has_pagination = true;
        self.max_pages = max_pages;
        self
    }

    /// Parses a JSON submission and validates it
    ///
    /// Missing required fields, unknown fields and out-of-range values all map to
    /// `JobError::InvalidRequest`.
    pub fn from_json(json: &str) -> Result<Self, JobError> {
        let request: Self =
            serde_json::from_str(json).map_err(|e| JobError::InvalidRequest(e.to_string()))?;
        request.validate()?;
        Ok(request)
    }

    /// Checks the request invariants and returns the parsed start URL
    ///
    /// # Rules
    ///
    /// - `url` is non-empty and an absolute http(s) URL with a host
    /// - `wait_time` is finite and within `0..=60` seconds
    /// - `max_pages` is within `1..=1000` when pagination is requested
    pub fn validate(&self) -> Result<Url, JobError> {
        let raw = self.url.trim();
        if raw.is_empty() {
            return Err(JobError::InvalidRequest("url must not be empty".to_string()));
        }

        let url = Url::parse(raw)
            .map_err(|e| JobError::InvalidRequest(format!("invalid url '{}': {}", raw, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(JobError::InvalidRequest(format!(
                "url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if url.host_str().is_none() {
            return Err(JobError::InvalidRequest(format!(
                "url '{}' has no host",
                raw
            )));
        }

        if !self.wait_time.is_finite() || self.wait_time < 0.0 {
            return Err(JobError::InvalidRequest(format!(
                "wait_time must be >= 0, got {}",
                self.wait_time
            )));
        }

        if self.wait_time > MAX_WAIT_TIME_SECS {
            return Err(JobError::InvalidRequest(format!(
                "wait_time must be <= {} seconds, got {}",
                MAX_WAIT_TIME_SECS, self.wait_time
            )));
        }

        if self.has_pagination && (self.max_pages < 1 || self.max_pages > MAX_PAGES_LIMIT) {
            return Err(JobError::InvalidRequest(format!(
                "max_pages must be between 1 and {} when pagination is enabled, got {}",
                MAX_PAGES_LIMIT, self.max_pages
            )));
        }

        Ok(url)
    }

    /// Number of pages the crawler may fetch for this request
    pub fn page_budget(&self) -> u32 {
        if self.has_pagination {
            self.max_pages.max(1)
        } else {
            1
        }
    }

    /// The selector to apply, with blank selectors treated as absent
    pub fn selector(&self) -> Option<&str> {
        self.selector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn wait_duration(&self) -> Duration {
        if self.wait_time.is_finite() && self.wait_time > 0.0 {
            Duration::from_secs_f64(self.wait_time)
        } else {
            Duration::ZERO
        }
    }
}
