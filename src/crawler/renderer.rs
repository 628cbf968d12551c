//! Page renderer: the crawler's only network collaborator
//!
//! This module handles:
//! - Building the HTTP client with browser-like headers
//! - Plain GET fetches with redirect following
//! - Delegating JavaScript rendering to an external render service
//! - Classifying failures into `RenderError`

use crate::config::RendererConfig;
use crate::{ConfigError, HarvestError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, Response};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Maximum redirect hops followed for one page
const MAX_REDIRECTS: usize = 10;

/// Errors raised while rendering a page
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP {status_code} fetching {url}")]
    Status { url: String, status_code: u16 },

    #[error("Unsupported content type '{content_type}' at {url}")]
    ContentMismatch { url: String, content_type: String },

    #[error("Failed to fetch {url}: {message}")]
    Transport { url: String, message: String },
}

/// What to render
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: Url,
    pub use_js: bool,
    /// Time to let scripts settle before the page is captured
    pub wait_time: Duration,
}

/// A rendered page body
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// URL after redirects; relative links resolve against it
    pub final_url: Url,
    pub body: String,
}

/// Fetches a fully rendered page body for a URL
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, RenderError>;
}

/// Renderer backed by reqwest
///
/// Plain fetches go straight to the target site. When `use_js` is requested and a
/// render endpoint is configured, the page is rendered by that service using the
/// Splash `render.html` contract (`GET endpoint?url=..&wait=..`).
pub struct HttpRenderer {
    client: Client,
    render_endpoint: Option<Url>,
}

impl HttpRenderer {
    /// Builds a renderer from the `[renderer]` config section
    ///
    /// # Returns
    ///
    /// * `Ok(HttpRenderer)` - Ready to fetch
    /// * `Err(HarvestError)` - The client could not be built or the endpoint is not a URL
    pub fn new(config: &RendererConfig) -> Result<Self, HarvestError> {
        let render_endpoint = config
            .render_endpoint
            .as_deref()
            .map(|endpoint| {
                Url::parse(endpoint).map_err(|e| {
                    ConfigError::InvalidUrl(format!("render-endpoint '{}': {}", endpoint, e))
                })
            })
            .transpose()?;

        Ok(Self {
            client: build_http_client(config)?,
            render_endpoint,
        })
    }

    async fn fetch(&self, url: &Url) -> Result<RenderedPage, RenderError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let final_url = response.url().clone();
        let body = read_html(url, response).await?;
        Ok(RenderedPage { final_url, body })
    }

    async fn render_remote(
        &self,
        endpoint: &Url,
        request: &RenderRequest,
    ) -> Result<RenderedPage, RenderError> {
        let mut render_url = endpoint.clone();
        render_url
            .query_pairs_mut()
            .append_pair("url", request.url.as_str())
            .append_pair("wait", &request.wait_time.as_secs_f64().to_string());

        debug!(url = %request.url, endpoint = %endpoint, "Delegating page to render service");

        let response = self
            .client
            .get(render_url)
            .send()
            .await
            .map_err(|e| classify_error(&request.url, e))?;

        let body = read_html(&request.url, response).await?;
        Ok(RenderedPage {
            final_url: request.url.clone(),
            body,
        })
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, RenderError> {
        if request.use_js {
            if let Some(endpoint) = &self.render_endpoint {
                return self.render_remote(endpoint, request).await;
            }

            warn!(
                url = %request.url,
                "JavaScript rendering requested but no render-endpoint is configured, using a plain fetch"
            );
            if !request.wait_time.is_zero() {
                tokio::time::sleep(request.wait_time).await;
            }
        }

        self.fetch(&request.url).await
    }
}

/// Builds an HTTP client with browser-like headers
///
/// # Arguments
///
/// * `config` - The renderer configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &RendererConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Checks status and content type, then reads the body
async fn read_html(url: &Url, response: Response) -> Result<String, RenderError> {
    let status = response.status();
    if !status.is_success() {
        return Err(RenderError::Status {
            url: url.to_string(),
            status_code: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if !is_html(&content_type) {
        return Err(RenderError::ContentMismatch {
            url: url.to_string(),
            content_type,
        });
    }

    response.text().await.map_err(|e| classify_error(url, e))
}

/// A missing content type is given the benefit of the doubt
fn is_html(content_type: &str) -> bool {
    content_type.is_empty() || content_type.contains("html")
}

fn classify_error(url: &Url, error: reqwest::Error) -> RenderError {
    if error.is_timeout() {
        RenderError::Timeout {
            url: url.to_string(),
        }
    } else {
        RenderError::Transport {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
