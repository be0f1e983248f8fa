use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::JobId;

/// A phase's durable resume point. `payload` is phase-specific JSON but
/// always carries `next_block_index` per schema and, for materialize,
/// per-output `chunk_ordinal` (see [`MaterializePayload`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub job_id: JobId,
    pub phase: String,
    pub payload_json: Value,
    pub updated_at: DateTime<Utc>,
}

impl CheckpointRecord {
    /// Path this record should live at: `checkpoints/<phase>/<job_id>.json`.
    #[must_use]
    pub fn relative_path(&self) -> String {
        format!("checkpoints/{}/{}.json", self.phase, self.job_id)
    }
}

/// Strongly-typed view of the materialize-phase checkpoint payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializePayload {
    pub next_block_index_by_schema: std::collections::BTreeMap<String, usize>,
    pub chunk_ordinal_by_output: std::collections::BTreeMap<String, u64>,
    pub writer_cursor: std::collections::BTreeMap<String, Value>,
}

impl MaterializePayload {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_block_index_by_schema: std::collections::BTreeMap::new(),
            chunk_ordinal_by_output: std::collections::BTreeMap::new(),
            writer_cursor: std::collections::BTreeMap::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).expect("MaterializePayload always serializes")
    }

    pub fn from_json(value: &Value) -> serde_json::Result<Self> {
        serde_json::from_value(value.clone())
    }
}

impl Default for MaterializePayload {
    fn default() -> Self {
        Self::new()
    }
}
