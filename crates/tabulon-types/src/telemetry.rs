use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{JobId, SchemaId};

/// A snapshot of one file's materialization progress, retained up to 500
/// rows per schema in the progress table (oldest evicted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileProgress {
    pub job_id: JobId,
    pub schema_id: SchemaId,
    pub file_path: String,
    pub processed_rows: u64,
    pub eta_seconds: Option<f64>,
    pub rows_per_sec: f64,
    pub spill_rows: u64,
    pub emitted_at: DateTime<Utc>,
}

/// Terminal-ish per-(job, schema) counters, written once materialize
/// finishes validating a schema's rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobMetrics {
    pub job_id: String,
    pub schema_id: String,
    pub rows: u64,
    pub rows_per_sec: f64,
    pub short_rows: u64,
    pub long_rows: u64,
    pub missing_required: u64,
    pub type_mismatches: u64,
    pub spill_count: u64,
    pub rows_spilled: u64,
    pub duration_ms: u64,
}

/// A JSON-lines progress event as emitted on the `--progress-log`/`telemetry-log` stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub ts: DateTime<Utc>,
    pub job_id: String,
    pub schema_id: String,
    pub file: String,
    pub processed_rows: u64,
    pub eta_s: Option<f64>,
    pub rows_per_sec: f64,
    pub spill_rows: u64,
}
