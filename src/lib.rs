//! Page-Harvest: asynchronous content extraction jobs
//!
//! This crate accepts extraction requests against a URL, runs them as background jobs
//! that follow pagination links up to a page budget, and lets callers poll job status
//! and fetch the extracted content once the job is complete.

pub mod config;
pub mod crawler;
pub mod job;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Page-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Storage error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced to callers of the job orchestrator
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Job not found or expired: {0}")]
    NotFound(job::JobId),

    #[error("Job {job_id} is not completed (status: {status}): {message}")]
    NotReady {
        job_id: job::JobId,
        status: job::JobStatus,
        message: String,
    },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: job::JobStatus,
        to: job::JobStatus,
    },

    #[error("Storage error: {0}")]
    Store(#[from] storage::StoreError),
}

/// Errors raised while a job is extracting content
///
/// These never reach the caller of `create`; they are recorded into the job's
/// `error` field and surfaced through status polling.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{0}")]
    Render(#[from] crawler::RenderError),

    #[error("{0}")]
    Match(#[from] crawler::MatchError),

    #[error("Invalid start URL: {0}")]
    Url(#[from] UrlError),

    #[error("No content extracted. The selector might not match any elements.")]
    NoContent,

    #[error("Extraction timed out after {0} seconds")]
    Timeout(u64),

    #[error("Failed to store result: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Failed to store job status: {0}")]
    StatusStore(storage::StoreError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Page-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for job orchestrator operations
pub type JobResult<T> = std::result::Result<T, JobError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{ContentMatcher, CssMatcher, HttpRenderer, Link, PageRenderer};
pub use job::{ExtractionRequest, ExtractionResult, JobId, JobOrchestrator, JobStatus, StatusView};
pub use crate::url::{extract_domain, normalize_url};
