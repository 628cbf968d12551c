//! SQLite store backends
//!
//! Each store owns one connection behind a mutex. `INSERT OR REPLACE` keyed by
//! job id keeps every write atomic per key.

use crate::crawler::Link;
use crate::job::{ExtractionResult, JobId, JobRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{JobStore, ResultStore, StoreError, StoreResult};
use crate::storage::FailureRecord;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Opens (or creates) a database file and initializes the schema
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(Connection)` - Successfully opened/created database
/// * `Err(rusqlite::Error)` - Failed to open database
pub fn open_connection(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA temp_store = MEMORY;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}

#[cfg(test)]
fn open_in_memory() -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open_in_memory()?;
    initialize_schema(&conn)?;
    Ok(conn)
}

fn lock(conn: &Mutex<Connection>) -> StoreResult<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|e| StoreError::Poisoned(e.to_string()))
}

fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", value, e)))
}

fn parse_job_id(value: &str) -> StoreResult<JobId> {
    value
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("bad job id '{}': {}", value, e)))
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Job record store backed by SQLite
///
/// Expiry uses wall-clock milliseconds so it survives restarts.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
    ttl: Duration,
}

impl SqliteJobStore {
    pub fn open(path: &Path, ttl: Duration) -> StoreResult<Self> {
        Ok(Self::from_connection(open_connection(path)?, ttl))
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory(ttl: Duration) -> StoreResult<Self> {
        Ok(Self::from_connection(open_in_memory()?, ttl))
    }

    fn from_connection(conn: Connection, ttl: Duration) -> Self {
        Self {
            conn: Mutex::new(conn),
            ttl,
        }
    }

    fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

impl JobStore for SqliteJobStore {
    fn put(&self, record: &JobRecord) -> StoreResult<()> {
        let json = serde_json::to_string(record)?;
        let expires_at = now_millis().saturating_add(self.ttl_millis());

        lock(&self.conn)?.execute(
            "INSERT OR REPLACE INTO job_records (job_id, record, expires_at)
             VALUES (?1, ?2, ?3)",
            params![record.id.to_string(), json, expires_at],
        )?;
        Ok(())
    }

    fn get(&self, id: JobId) -> StoreResult<Option<JobRecord>> {
        let conn = lock(&self.conn)?;
        let key = id.to_string();

        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT record, expires_at FROM job_records WHERE job_id = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((_, expires_at)) if expires_at <= now_millis() => {
                conn.execute("DELETE FROM job_records WHERE job_id = ?1", params![key])?;
                Ok(None)
            }
            Some((json, _)) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn purge_expired(&self) -> StoreResult<usize> {
        let removed = lock(&self.conn)?.execute(
            "DELETE FROM job_records WHERE expires_at <= ?1",
            params![now_millis()],
        )?;
        Ok(removed)
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Result store backed by SQLite, including the failure log
pub struct SqliteResultStore {
    conn: Mutex<Connection>,
}

impl SqliteResultStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        Ok(Self {
            conn: Mutex::new(open_connection(path)?),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StoreResult<Self> {
        Ok(Self {
            conn: Mutex::new(open_in_memory()?),
        })
    }
}

/// Raw column values of an `extraction_results` row
struct ResultRow {
    job_id: String,
    url: String,
    selector: Option<String>,
    pages_extracted: i64,
    total_characters: i64,
    total_links: i64,
    content: String,
    links: String,
    created_at: String,
    completed_at: String,
}

impl ResultRow {
    fn into_result(self) -> StoreResult<ExtractionResult> {
        let links: Vec<Link> = serde_json::from_str(&self.links)?;
        let count = |value: i64, column: &str| {
            u64::try_from(value)
                .map_err(|_| StoreError::Corrupt(format!("negative {}: {}", column, value)))
        };

        Ok(ExtractionResult {
            job_id: parse_job_id(&self.job_id)?,
            url: self.url,
            selector: self.selector,
            pages_extracted: u32::try_from(self.pages_extracted).map_err(|_| {
                StoreError::Corrupt(format!("bad pages_extracted: {}", self.pages_extracted))
            })?,
            total_characters: count(self.total_characters, "total_characters")?,
            total_links: count(self.total_links, "total_links")?,
            content: self.content,
            links,
            created_at: parse_timestamp(&self.created_at)?,
            completed_at: parse_timestamp(&self.completed_at)?,
        })
    }
}

impl ResultStore for SqliteResultStore {
    fn put(&self, result: &ExtractionResult) -> StoreResult<()> {
        let links = serde_json::to_string(&result.links)?;

        lock(&self.conn)?.execute(
            "INSERT OR REPLACE INTO extraction_results
             (job_id, url, selector, pages_extracted, total_characters, total_links,
              content, links, created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                result.job_id.to_string(),
                result.url,
                result.selector,
                result.pages_extracted,
                result.total_characters as i64,
                result.total_links as i64,
                result.content,
                links,
                result.created_at.to_rfc3339(),
                result.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: JobId) -> StoreResult<Option<ExtractionResult>> {
        let row = lock(&self.conn)?
            .query_row(
                "SELECT job_id, url, selector, pages_extracted, total_characters, total_links,
                        content, links, created_at, completed_at
                 FROM extraction_results WHERE job_id = ?1",
                params![id.to_string()],
                |row| {
                    Ok(ResultRow {
                        job_id: row.get(0)?,
                        url: row.get(1)?,
                        selector: row.get(2)?,
                        pages_extracted: row.get(3)?,
                        total_characters: row.get(4)?,
                        total_links: row.get(5)?,
                        content: row.get(6)?,
                        links: row.get(7)?,
                        created_at: row.get(8)?,
                        completed_at: row.get(9)?,
                    })
                },
            )
            .optional()?;

        row.map(ResultRow::into_result).transpose()
    }

    fn evict(&self, id: JobId) -> StoreResult<bool> {
        let removed = lock(&self.conn)?.execute(
            "DELETE FROM extraction_results WHERE job_id = ?1",
            params![id.to_string()],
        )?;
        Ok(removed > 0)
    }

    fn record_failure(&self, failure: &FailureRecord) -> StoreResult<()> {
        lock(&self.conn)?.execute(
            "INSERT INTO extraction_errors (job_id, url, selector, error, failed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                failure.job_id.to_string(),
                failure.url,
                failure.selector,
                failure.error,
                failure.failed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn failures(&self, id: JobId) -> StoreResult<Vec<FailureRecord>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT url, selector, error, failed_at FROM extraction_errors
             WHERE job_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(url, selector, error, failed_at)| {
                Ok(FailureRecord {
                    job_id: id,
                    url,
                    selector,
                    error,
                    failed_at: parse_timestamp(&failed_at)?,
                })
            })
            .collect()
    }
}
