//! Database schema definitions
//!
//! Both SQLite stores initialize the full schema, so they can share one database
//! file or live in separate ones.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Ephemeral job status records, one JSON document per job
CREATE TABLE IF NOT EXISTS job_records (
    job_id TEXT PRIMARY KEY,
    record TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_job_records_expires ON job_records(expires_at);

-- Durable extraction results
CREATE TABLE IF NOT EXISTS extraction_results (
    job_id TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    selector TEXT,
    pages_extracted INTEGER NOT NULL,
    total_characters INTEGER NOT NULL,
    total_links INTEGER NOT NULL,
    content TEXT NOT NULL,
    links TEXT NOT NULL,
    created_at TEXT NOT NULL,
    completed_at TEXT NOT NULL
);

-- Log of failed extractions
CREATE TABLE IF NOT EXISTS extraction_errors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL,
    url TEXT NOT NULL,
    selector TEXT,
    error TEXT NOT NULL,
    failed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_extraction_errors_job ON extraction_errors(job_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
