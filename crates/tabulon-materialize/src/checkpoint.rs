//! Checkpoint registry (spec.md §4.J): durable resume points written under
//! `<root>/checkpoints/<phase>/<job_id>.json`, via write-temp-then-rename so
//! a crash mid-write never corrupts the previous checkpoint.

use std::fs;
use std::path::{Path, PathBuf};

use tabulon_error::TabulonError;
use tabulon_types::CheckpointRecord;

pub struct CheckpointRegistry {
    root: PathBuf,
}

fn io_err(path: &Path, e: std::io::Error) -> TabulonError {
    TabulonError::Io { path: path.to_path_buf(), source: e }
}

impl CheckpointRegistry {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, record: &CheckpointRecord) -> PathBuf {
        self.root.join(record.relative_path())
    }

    pub fn save(&self, record: &CheckpointRecord) -> Result<(), TabulonError> {
        let final_path = self.path_for(record);
        let parent = final_path
            .parent()
            .ok_or_else(|| TabulonError::Storage("checkpoint path has no parent".into()))?;
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;

        let tmp_path = parent.join(format!(".{}.tmp", record.job_id));
        let json = serde_json::to_vec_pretty(record).map_err(|e| TabulonError::Storage(e.to_string()))?;
        fs::write(&tmp_path, &json).map_err(|e| io_err(&tmp_path, e))?;
        fs::rename(&tmp_path, &final_path).map_err(|e| io_err(&final_path, e))?;
        Ok(())
    }

    pub fn load(&self, phase: &str, job_id: &str) -> Result<Option<CheckpointRecord>, TabulonError> {
        let path = self.root.join(format!("checkpoints/{phase}/{job_id}.json"));
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| io_err(&path, e))?;
        let record = serde_json::from_slice(&bytes).map_err(|e| TabulonError::Storage(e.to_string()))?;
        Ok(Some(record))
    }

    /// Remove a checkpoint once its phase has completed for this job.
    pub fn remove(&self, phase: &str, job_id: &str) -> Result<(), TabulonError> {
        let path = self.root.join(format!("checkpoints/{phase}/{job_id}.json"));
        if path.exists() {
            fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
        }
        Ok(())
    }
}
