use crate::config::types::{Config, CrawlerConfig, RendererConfig, ServiceConfig, StorageConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_service_config(&config.service)?;
    validate_crawler_config(&config.crawler)?;
    validate_renderer_config(&config.renderer)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates job scheduling configuration
fn validate_service_config(config: &ServiceConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_jobs < 1 || config.max_concurrent_jobs > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_jobs must be between 1 and 64, got {}",
            config.max_concurrent_jobs
        )));
    }

    if config.job_ttl_secs < 1 {
        return Err(ConfigError::Validation(
            "job_ttl_secs must be >= 1".to_string(),
        ));
    }

    if config.job_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "job_timeout_secs must be >= 1 when set".to_string(),
        ));
    }

    if config.purge_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "purge_interval_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.page_delay_ms > 60_000 {
        return Err(ConfigError::Validation(format!(
            "page_delay_ms must be <= 60000ms, got {}ms",
            config.page_delay_ms
        )));
    }

    Ok(())
}

/// Validates renderer configuration
fn validate_renderer_config(config: &RendererConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 || config.timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be between 1 and 300, got {}",
            config.timeout_secs
        )));
    }

    if let Some(endpoint) = &config.render_endpoint {
        let url = Url::parse(endpoint)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid render_endpoint: {}", e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "render_endpoint must use http or https, got '{}'",
                url.scheme()
            )));
        }
    }

    Ok(())
}

/// Validates store configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if !config.uses_sqlite() {
        return Ok(());
    }

    match config.database_path.as_deref() {
        Some(path) if !path.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::Validation(
            "database_path is required when a sqlite backend is selected".to_string(),
        )),
    }
}
