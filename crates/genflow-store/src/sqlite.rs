//! SQLite store implementation.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, params};
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::definition::ScheduleDefinition;
use crate::error::StoreError;
use crate::history::ExecutionRecord;
use crate::job::{Job, JobStatus};
use crate::schema::init_schema;
use crate::store::JobStore;

/// SQLite-backed store. Rows carry indexed scan columns plus a JSON body.
pub struct SqliteJobStore {
    conn: Connection,
}

impl SqliteJobStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        conn.call(|conn| Ok(init_schema(conn)?)).await?;
        Ok(Self { conn })
    }

    /// Open (or create) a file-backed database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Database(format!("Failed to create {:?}: {}", parent, e)))?;
        }
        let conn = Connection::open(path.clone()).await?;
        conn.call(|conn| Ok(init_schema(conn)?)).await?;
        debug!("SqliteJobStore opened at {:?}", path);
        Ok(Self { conn })
    }

    async fn query_bodies(&self, sql: &'static str, arg: Option<String>) -> Result<Vec<String>, StoreError> {
        let bodies = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(sql)?;
                let rows = match arg {
                    Some(arg) => stmt
                        .query_map([arg], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<_>, _>>()?,
                    None => stmt
                        .query_map([], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<_>, _>>()?,
                };
                Ok(rows)
            })
            .await?;
        Ok(bodies)
    }

    async fn query_body(&self, sql: &'static str, id: &str) -> Result<Option<String>, StoreError> {
        let id = id.to_string();
        let body = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(sql, [id], |row| row.get::<_, String>(0))
                    .optional()?)
            })
            .await?;
        Ok(body)
    }

    async fn query_history(
        &self,
        sql: &'static str,
        arg: Option<String>,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(sql)?;
                let rows = match arg {
                    Some(arg) => stmt.query_map([arg], history_row)?.collect::<Result<Vec<_>, _>>()?,
                    None => stmt.query_map([], history_row)?.collect::<Result<Vec<_>, _>>()?,
                };
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(id, job_id, status, duration_ms, recorded_at)| {
                Ok(ExecutionRecord {
                    id,
                    job_id,
                    status: status.parse().map_err(StoreError::Corrupt)?,
                    duration_ms,
                    recorded_at: parse_timestamp(&recorded_at)?,
                })
            })
            .collect()
    }
}

type HistoryRow = (String, String, String, i64, String);

fn history_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

/// Fixed-width RFC 3339 so lexical order matches time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}

fn decode_all<T: serde::de::DeserializeOwned>(bodies: Vec<String>) -> Result<Vec<T>, StoreError> {
    bodies
        .iter()
        .map(|body| serde_json::from_str(body).map_err(StoreError::from))
        .collect()
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        let body = serde_json::to_string(job)?;
        let id = job.id.clone();
        let status = job.status.as_str();
        let priority = job.priority.rank();
        let seq = job.seq as i64;
        let created_at = format_timestamp(job.created_at);

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO jobs (id, status, priority, seq, created_at, body)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(id) DO UPDATE SET
                        status = excluded.status,
                        priority = excluded.priority,
                        seq = excluded.seq,
                        body = excluded.body",
                    params![id, status, priority, seq, created_at, body],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let body = self.query_body("SELECT body FROM jobs WHERE id = ?1", id).await?;
        body.map(|b| serde_json::from_str(&b).map_err(StoreError::from))
            .transpose()
    }

    async fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let bodies = self
            .query_bodies(
                "SELECT body FROM jobs WHERE status = ?1 ORDER BY seq ASC",
                Some(status.as_str().to_string()),
            )
            .await?;
        decode_all(bodies)
    }

    async fn queued_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let bodies = self
            .query_bodies(
                "SELECT body FROM jobs WHERE status = 'queued' ORDER BY priority DESC, seq ASC",
                None,
            )
            .await?;
        decode_all(bodies)
    }

    async fn max_sequence(&self) -> Result<u64, StoreError> {
        let max = self
            .conn
            .call(|conn| {
                Ok(conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM jobs", [], |row| {
                    row.get::<_, i64>(0)
                })?)
            })
            .await?;
        Ok(max.max(0) as u64)
    }

    async fn save_definition(&self, definition: &ScheduleDefinition) -> Result<(), StoreError> {
        let body = serde_json::to_string(definition)?;
        let id = definition.id.clone();
        let enabled = definition.enabled;
        let next_run_at = definition.state.next_run_at.map(format_timestamp);
        let created_at = format_timestamp(definition.created_at);

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO schedule_definitions (id, enabled, next_run_at, created_at, body)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET
                        enabled = excluded.enabled,
                        next_run_at = excluded.next_run_at,
                        body = excluded.body",
                    params![id, enabled, next_run_at, created_at, body],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn get_definition(&self, id: &str) -> Result<Option<ScheduleDefinition>, StoreError> {
        let body = self
            .query_body("SELECT body FROM schedule_definitions WHERE id = ?1", id)
            .await?;
        body.map(|b| serde_json::from_str(&b).map_err(StoreError::from))
            .transpose()
    }

    async fn list_definitions(&self) -> Result<Vec<ScheduleDefinition>, StoreError> {
        let bodies = self
            .query_bodies(
                "SELECT body FROM schedule_definitions ORDER BY created_at ASC",
                None,
            )
            .await?;
        decode_all(bodies)
    }

    async fn delete_definition(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        let deleted = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM schedule_definitions WHERE id = ?1", [id])?))
            .await?;
        Ok(deleted > 0)
    }

    async fn append_history(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let record = record.clone();
        let recorded_at = format_timestamp(record.recorded_at);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO execution_history (id, job_id, status, duration_ms, recorded_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        record.id,
                        record.job_id,
                        record.status.as_str(),
                        record.duration_ms,
                        recorded_at
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn history(&self, job_id: Option<&str>) -> Result<Vec<ExecutionRecord>, StoreError> {
        match job_id {
            Some(job_id) => {
                self.query_history(
                    "SELECT id, job_id, status, duration_ms, recorded_at FROM execution_history
                     WHERE job_id = ?1 ORDER BY recorded_at ASC",
                    Some(job_id.to_string()),
                )
                .await
            }
            None => {
                self.query_history(
                    "SELECT id, job_id, status, duration_ms, recorded_at FROM execution_history
                     ORDER BY recorded_at ASC",
                    None,
                )
                .await
            }
        }
    }

    async fn history_since(&self, since: DateTime<Utc>) -> Result<Vec<ExecutionRecord>, StoreError> {
        self.query_history(
            "SELECT id, job_id, status, duration_ms, recorded_at FROM execution_history
             WHERE recorded_at >= ?1 ORDER BY recorded_at ASC",
            Some(format_timestamp(since)),
        )
        .await
    }
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
