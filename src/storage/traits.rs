//! Storage traits and error types
//!
//! This module defines the two keyed stores the orchestrator writes to: the
//! short-lived job record store that pollers read, and the durable result store.

use crate::job::{ExtractionResult, JobId, JobRecord};
use crate::storage::FailureRecord;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt stored value: {0}")]
    Corrupt(String),

    #[error("Store lock poisoned: {0}")]
    Poisoned(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Ephemeral store for job status records
///
/// Every entry expires a fixed TTL after its most recent `put`, so a job that
/// keeps reporting progress never expires mid-flight. Each `put` replaces the
/// whole record in one write; readers never see a partially written record.
pub trait JobStore: Send + Sync {
    /// Inserts or replaces a record and restarts its TTL
    fn put(&self, record: &JobRecord) -> StoreResult<()>;

    /// Gets a record, or `None` if it was never written or has expired
    fn get(&self, id: JobId) -> StoreResult<Option<JobRecord>>;

    /// Drops every expired record, returning how many were removed
    fn purge_expired(&self) -> StoreResult<usize>;

    /// Retention window applied on every write
    fn ttl(&self) -> Duration;
}

/// Durable store for extraction results
///
/// Results never expire on their own; `evict` is the only way to remove one.
pub trait ResultStore: Send + Sync {
    /// Inserts or replaces the result for its job id
    fn put(&self, result: &ExtractionResult) -> StoreResult<()>;

    fn get(&self, id: JobId) -> StoreResult<Option<ExtractionResult>>;

    /// Removes a result, returning whether one existed
    fn evict(&self, id: JobId) -> StoreResult<bool>;

    // ===== Failure Log =====

    /// Appends an entry to the extraction failure log
    ///
    /// This never creates a result for the job.
    fn record_failure(&self, failure: &FailureRecord) -> StoreResult<()>;

    /// Gets all logged failures for a job, oldest first
    fn failures(&self, id: JobId) -> StoreResult<Vec<FailureRecord>>;
}
