//! Storage module for job records and extraction results
//!
//! This module provides:
//! - The `JobStore` and `ResultStore` traits the orchestrator writes through
//! - In-memory backends (the default)
//! - SQLite backends sharing one schema
//! - `open_stores` to build the backends selected in the configuration

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::{MemoryJobStore, MemoryResultStore};
pub use sqlite::{open_connection, SqliteJobStore, SqliteResultStore};
pub use traits::{JobStore, ResultStore, StoreError, StoreResult};

use crate::config::{StorageBackend, StorageConfig};
use crate::job::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// One entry of the extraction failure log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub job_id: JobId,
    pub url: String,
    pub selector: Option<String>,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// Opens the job record store and the result store selected by `config`
///
/// # Arguments
///
/// * `config` - The storage section of the service configuration
/// * `job_ttl` - Retention window of job records
///
/// # Returns
///
/// * `Ok((jobs, results))` - Both stores, ready to share across tasks
/// * `Err(StoreError)` - A SQLite database could not be opened
pub fn open_stores(
    config: &StorageConfig,
    job_ttl: Duration,
) -> StoreResult<(Arc<dyn JobStore>, Arc<dyn ResultStore>)> {
    let database_path = || {
        config
            .database_path
            .as_deref()
            .map(Path::new)
            .ok_or_else(|| StoreError::Unavailable("database-path is not set".to_string()))
    };

    let jobs: Arc<dyn JobStore> = match config.job_backend {
        StorageBackend::Memory => Arc::new(MemoryJobStore::new(job_ttl)),
        StorageBackend::Sqlite => Arc::new(SqliteJobStore::open(database_path()?, job_ttl)?),
    };

    let results: Arc<dyn ResultStore> = match config.result_backend {
        StorageBackend::Memory => Arc::new(MemoryResultStore::new()),
        StorageBackend::Sqlite => Arc::new(SqliteResultStore::open(database_path()?)?),
    };

    Ok((jobs, results))
}
