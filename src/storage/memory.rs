//! In-memory store backends
//!
//! Job record expiry uses `tokio::time::Instant`, so paused-clock tests can step
//! past the TTL without sleeping.

use crate::job::{ExtractionResult, JobId, JobRecord};
use crate::storage::traits::{JobStore, ResultStore, StoreError, StoreResult};
use crate::storage::FailureRecord;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| StoreError::Poisoned(e.to_string()))
}

/// Job record store held in process memory
#[derive(Debug)]
pub struct MemoryJobStore {
    ttl: Duration,
    entries: Mutex<HashMap<JobId, (JobRecord, Instant)>>,
}

impl MemoryJobStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl JobStore for MemoryJobStore {
    fn put(&self, record: &JobRecord) -> StoreResult<()> {
        let expires_at = Instant::now() + self.ttl;
        lock(&self.entries)?.insert(record.id, (record.clone(), expires_at));
        Ok(())
    }

    fn get(&self, id: JobId) -> StoreResult<Option<JobRecord>> {
        let mut entries = lock(&self.entries)?;
        match entries.get(&id) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.remove(&id);
                Ok(None)
            }
            Some((record, _)) => Ok(Some(record.clone())),
            None => Ok(None),
        }
    }

    fn purge_expired(&self) -> StoreResult<usize> {
        let now = Instant::now();
        let mut entries = lock(&self.entries)?;
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        Ok(before - entries.len())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Failure log entries kept by default before the oldest are dropped
pub const DEFAULT_FAILURE_CAPACITY: usize = 10_000;

/// Result store held in process memory, with a bounded failure log
#[derive(Debug)]
pub struct MemoryResultStore {
    results: Mutex<HashMap<JobId, ExtractionResult>>,
    failures: Mutex<VecDeque<FailureRecord>>,
    failure_capacity: usize,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::with_failure_capacity(DEFAULT_FAILURE_CAPACITY)
    }

    /// Keeps at most `capacity` failure log entries, dropping the oldest first
    pub fn with_failure_capacity(capacity: usize) -> Self {
        Self {
            results: Mutex::new(HashMap::new()),
            failures: Mutex::new(VecDeque::new()),
            failure_capacity: capacity.max(1),
        }
    }
}

impl Default for MemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore for MemoryResultStore {
    fn put(&self, result: &ExtractionResult) -> StoreResult<()> {
        lock(&self.results)?.insert(result.job_id, result.clone());
        Ok(())
    }

    fn get(&self, id: JobId) -> StoreResult<Option<ExtractionResult>> {
        Ok(lock(&self.results)?.get(&id).cloned())
    }

    fn evict(&self, id: JobId) -> StoreResult<bool> {
        Ok(lock(&self.results)?.remove(&id).is_some())
    }

    fn record_failure(&self, failure: &FailureRecord) -> StoreResult<()> {
        let mut failures = lock(&self.failures)?;
        while failures.len() >= self.failure_capacity {
            failures.pop_front();
        }
        failures.push_back(failure.clone());
        Ok(())
    }

    fn failures(&self, id: JobId) -> StoreResult<Vec<FailureRecord>> {
        Ok(lock(&self.failures)?
            .iter()
            .filter(|f| f.job_id == id)
            .cloned()
            .collect())
    }
}
