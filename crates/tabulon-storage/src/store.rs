//! The durable store (spec.md §4.K): a single rusqlite connection behind a
//! mutex, fronting the tables the migrations create. Retention on
//! `job_progress_events` caps each schema to the most recent 500 rows,
//! evicting the oldest on insert.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use tabulon_error::TabulonError;
use tabulon_types::{
    FileBlock, HeaderClusterDocument, JobEvent, JobId, JobMetrics, JobState, JobStatus, SchemaDefinition,
};

use crate::migrations;

const PROGRESS_RETENTION_PER_SCHEMA: i64 = 500;

pub struct Store {
    conn: Mutex<Connection>,
}

fn storage_err(e: impl std::fmt::Display) -> TabulonError {
    TabulonError::Storage(e.to_string())
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, TabulonError> {
        let conn = Connection::open(path).map_err(|e| TabulonError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?;
        migrations::apply_all(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, TabulonError> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        migrations::apply_all(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    // --- schemas -----------------------------------------------------

    pub fn save_schema_definition(&self, schema: &SchemaDefinition) -> Result<(), TabulonError> {
        let json = serde_json::to_string(schema).map_err(storage_err)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO schemas (schema_id, json) VALUES (?1, ?2)
             ON CONFLICT(schema_id) DO UPDATE SET json = excluded.json",
            params![schema.schema_id.to_string(), json],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    pub fn load_schema_definition(&self, schema_id: &str) -> Result<Option<SchemaDefinition>, TabulonError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT json FROM schemas WHERE schema_id = ?1")
            .map_err(storage_err)?;
        let mut rows = stmt.query(params![schema_id]).map_err(storage_err)?;
        match rows.next().map_err(storage_err)? {
            Some(row) => {
                let json: String = row.get(0).map_err(storage_err)?;
                Ok(Some(serde_json::from_str(&json).map_err(storage_err)?))
            }
            None => Ok(None),
        }
    }

    // --- blocks --------------------------------------------------------

    pub fn save_block(&self, block: &FileBlock) -> Result<i64, TabulonError> {
        let json = serde_json::to_string(block).map_err(storage_err)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO blocks (file_path, start_line, end_line, json) VALUES (?1, ?2, ?3, ?4)",
            params![block.file_path, block.start_line, block.end_line, json],
        )
        .map_err(storage_err)?;
        Ok(conn.last_insert_rowid())
    }

    // --- header clusters -------------------------------------------------

    pub fn save_header_cluster_document(&self, doc: &HeaderClusterDocument) -> Result<(), TabulonError> {
        let conn = self.conn.lock().unwrap();
        for cluster in &doc.clusters {
            let json = serde_json::to_string(cluster).map_err(storage_err)?;
            conn.execute(
                "INSERT INTO header_clusters (cluster_id, artifact_version, json) VALUES (?1, ?2, ?3)
                 ON CONFLICT(cluster_id) DO UPDATE SET artifact_version = excluded.artifact_version, json = excluded.json",
                params![cluster.cluster_id, doc.artifact_version, json],
            )
            .map_err(storage_err)?;
        }
        Ok(())
    }

    // --- job status / events --------------------------------------------

    pub fn upsert_job_status(&self, status: &JobStatus) -> Result<(), TabulonError> {
        let metadata_json = serde_json::to_string(&status.metadata).map_err(storage_err)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO job_status (job_id, state, detail, last_error, metadata_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(job_id) DO UPDATE SET
                state = excluded.state,
                detail = excluded.detail,
                last_error = excluded.last_error,
                metadata_json = excluded.metadata_json,
                updated_at = excluded.updated_at",
            params![
                status.job_id.to_string(),
                state_to_str(status.state),
                status.detail,
                status.last_error,
                metadata_json,
                status.created_at.to_rfc3339(),
                status.updated_at.to_rfc3339(),
            ],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    pub fn get_job_status(&self, job_id: &JobId) -> Result<Option<JobStatus>, TabulonError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT state, detail, last_error, metadata_json, created_at, updated_at
                 FROM job_status WHERE job_id = ?1",
            )
            .map_err(storage_err)?;
        let mut rows = stmt.query(params![job_id.to_string()]).map_err(storage_err)?;
        match rows.next().map_err(storage_err)? {
            Some(row) => {
                let state_str: String = row.get(0).map_err(storage_err)?;
                let metadata_json: String = row.get(3).map_err(storage_err)?;
                let created_at: String = row.get(4).map_err(storage_err)?;
                let updated_at: String = row.get(5).map_err(storage_err)?;
                Ok(Some(JobStatus {
                    job_id: job_id.clone(),
                    state: str_to_state(&state_str)?,
                    detail: row.get(1).map_err(storage_err)?,
                    last_error: row.get(2).map_err(storage_err)?,
                    metadata: serde_json::from_str::<BTreeMap<String, String>>(&metadata_json)
                        .map_err(storage_err)?,
                    created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                        .map_err(storage_err)?
                        .with_timezone(&chrono::Utc),
                    updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
                        .map_err(storage_err)?
                        .with_timezone(&chrono::Utc),
                }))
            }
            None => Ok(None),
        }
    }

    pub fn record_job_event(&self, event: &JobEvent) -> Result<(), TabulonError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO job_events (job_id, state, detail, at) VALUES (?1, ?2, ?3, ?4)",
            params![
                event.job_id.to_string(),
                state_to_str(event.state),
                event.detail,
                event.at.to_rfc3339()
            ],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    // --- job metrics / progress ------------------------------------------

    pub fn save_job_metrics(&self, metrics: &JobMetrics) -> Result<(), TabulonError> {
        let json = serde_json::to_string(metrics).map_err(storage_err)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO job_metrics (job_id, schema_id, json) VALUES (?1, ?2, ?3)
             ON CONFLICT(job_id, schema_id) DO UPDATE SET json = excluded.json",
            params![metrics.job_id, metrics.schema_id, json],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    /// Record a progress event, then evict the oldest rows past the
    /// per-schema retention cap.
    pub fn record_progress_event(
        &self,
        job_id: &str,
        schema_id: &str,
        json: &str,
        emitted_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), TabulonError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO job_progress_events (job_id, schema_id, json, emitted_at) VALUES (?1, ?2, ?3, ?4)",
            params![job_id, schema_id, json, emitted_at.to_rfc3339()],
        )
        .map_err(storage_err)?;

        conn.execute(
            "DELETE FROM job_progress_events
             WHERE schema_id = ?1 AND id NOT IN (
                 SELECT id FROM job_progress_events WHERE schema_id = ?1
                 ORDER BY id DESC LIMIT ?2
             )",
            params![schema_id, PROGRESS_RETENTION_PER_SCHEMA],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    pub fn progress_event_count(&self, schema_id: &str) -> Result<i64, TabulonError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM job_progress_events WHERE schema_id = ?1",
            params![schema_id],
            |r| r.get(0),
        )
        .map_err(storage_err)
    }

    // --- audit log --------------------------------------------------------

    pub fn append_audit_log(&self, job_id: Option<&str>, event: &str) -> Result<(), TabulonError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO audit_log (job_id, event, at) VALUES (?1, ?2, ?3)",
            params![job_id, event, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    // --- synonyms & artifact metadata -------------------------------------

    pub fn record_synonym(&self, raw_name: &str, canonical_name: &str) -> Result<(), TabulonError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO synonyms (raw_name, canonical_name) VALUES (?1, ?2)",
            params![raw_name, canonical_name],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    pub fn set_artifact_metadata(&self, key: &str, value: &str) -> Result<(), TabulonError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO artifact_metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(storage_err)?;
        Ok(())
    }
}

fn state_to_str(state: JobState) -> &'static str {
    match state {
        JobState::Pending => "pending",
        JobState::Analyzing => "analyzing",
        JobState::Mapping => "mapping",
        JobState::Materializing => "materializing",
        JobState::Validating => "validating",
        JobState::Done => "done",
        JobState::Failed => "failed",
        JobState::Cancelled => "cancelled",
    }
}

fn str_to_state(s: &str) -> Result<JobState, TabulonError> {
    Ok(match s {
        "pending" => JobState::Pending,
        "analyzing" => JobState::Analyzing,
        "mapping" => JobState::Mapping,
        "materializing" => JobState::Materializing,
        "validating" => JobState::Validating,
        "done" => JobState::Done,
        "failed" => JobState::Failed,
        "cancelled" => JobState::Cancelled,
        other => return Err(TabulonError::Storage(format!("unknown job state {other:?}"))),
    })
}
