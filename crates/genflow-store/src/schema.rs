//! Database schema management.

use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

// Scan columns are duplicated out of the JSON body so status / time-range
// queries stay on indexes.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    priority INTEGER NOT NULL,
    seq INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    body TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schedule_definitions (
    id TEXT PRIMARY KEY,
    enabled INTEGER NOT NULL,
    next_run_at TEXT,
    created_at TEXT NOT NULL,
    body TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS execution_history (
    id TEXT PRIMARY KEY,
    job_id TEXT NOT NULL,
    status TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_dispatch ON jobs(status, priority DESC, seq);
CREATE INDEX IF NOT EXISTS idx_definitions_next_run ON schedule_definitions(enabled, next_run_at);
CREATE INDEX IF NOT EXISTS idx_history_job ON execution_history(job_id);
CREATE INDEX IF NOT EXISTS idx_history_recorded ON execution_history(recorded_at);
"#;
