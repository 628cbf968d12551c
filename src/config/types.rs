use serde::Deserialize;
use std::time::Duration;

/// Browser-like user agent sent by the HTTP renderer unless overridden
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main configuration structure for Page-Harvest
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub service: ServiceConfig,
    pub crawler: CrawlerConfig,
    pub renderer: RendererConfig,
    pub storage: StorageConfig,
}

/// Job scheduling configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ServiceConfig {
    /// Maximum number of extraction jobs running at the same time
    pub max_concurrent_jobs: u32,

    /// How long a job status record lives after its last update (seconds)
    pub job_ttl_secs: u64,

    /// Optional deadline for a whole extraction job (seconds)
    pub job_timeout_secs: Option<u64>,

    /// How often expired job records are swept from the job store (seconds)
    pub purge_interval_secs: u64,
}

impl ServiceConfig {
    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            job_ttl_secs: 3600,
            job_timeout_secs: None,
            purge_interval_secs: 60,
        }
    }
}

/// Pagination crawler behavior
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CrawlerConfig {
    /// Pause between two page fetches of the same job (milliseconds)
    pub page_delay_ms: u64,
}

impl CrawlerConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

/// Page renderer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RendererConfig {
    /// User agent sent with every page request
    pub user_agent: String,

    /// Per-request timeout (seconds)
    pub timeout_secs: u64,

    /// Rendering service used for JavaScript pages (Splash-style `render.html`)
    pub render_endpoint: Option<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            render_endpoint: None,
        }
    }
}

/// Backend used for one of the two stores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Store configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct StorageConfig {
    /// Backend for the ephemeral job status store
    pub job_backend: StorageBackend,

    /// Backend for the durable result store
    pub result_backend: StorageBackend,

    /// Path to the SQLite database file (required by the sqlite backend)
    pub database_path: Option<String>,
}

impl StorageConfig {
    pub fn uses_sqlite(&self) -> bool {
        self.job_backend == StorageBackend::Sqlite || self.result_backend == StorageBackend::Sqlite
    }
}
