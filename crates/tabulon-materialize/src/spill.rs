//! Back-pressure buffer (spec.md §5): rows accumulate in memory up to
//! `spill_threshold`, then overflow to a temp file so a slow writer never
//! forces the whole pipeline to block on unbounded memory growth.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};

use tabulon_error::TabulonError;

pub struct SpillBuffer {
    threshold: usize,
    in_memory: Vec<Vec<Option<String>>>,
    spill_file: Option<File>,
    spill_path: Option<std::path::PathBuf>,
    spilled_rows: u64,
    total_spilled_rows: u64,
}

fn io_err(path: &std::path::Path, e: std::io::Error) -> TabulonError {
    TabulonError::Io { path: path.to_path_buf(), source: e }
}

impl SpillBuffer {
    #[must_use]
    pub fn new(threshold: usize, temp_dir: &std::path::Path) -> Self {
        let _ = temp_dir;
        Self {
            threshold: threshold.max(1),
            in_memory: Vec::new(),
            spill_file: None,
            spill_path: None,
            spilled_rows: 0,
            total_spilled_rows: 0,
        }
    }

    /// Rows currently spilled to disk (resets to 0 on [`Self::drain_all`]).
    #[must_use]
    pub fn spilled_rows(&self) -> u64 {
        self.spilled_rows
    }

    /// Rows spilled to disk across the buffer's whole lifetime, including
    /// rows already drained — never resets. Use this for job metrics.
    #[must_use]
    pub fn total_spilled_rows(&self) -> u64 {
        self.total_spilled_rows
    }

    #[must_use]
    pub fn resident_rows(&self) -> usize {
        self.in_memory.len()
    }

    pub fn push(&mut self, row: Vec<Option<String>>, temp_dir: &std::path::Path) -> Result<(), TabulonError> {
        if self.in_memory.len() < self.threshold {
            self.in_memory.push(row);
            return Ok(());
        }

        if self.spill_file.is_none() {
            let path = temp_dir.join(format!("tabulon-spill-{}.jsonl", std::process::id()));
            let file = File::create(&path).map_err(|e| io_err(&path, e))?;
            self.spill_path = Some(path);
            self.spill_file = Some(file);
        }

        let line = serde_json::to_string(&row).map_err(|e| TabulonError::Storage(e.to_string()))?;
        let path = self.spill_path.clone().unwrap();
        let file = self.spill_file.as_mut().unwrap();
        writeln!(file, "{line}").map_err(|e| io_err(&path, e))?;
        self.spilled_rows += 1;
        self.total_spilled_rows += 1;
        Ok(())
    }

    /// Drain every buffered row — in-memory first, then spilled — leaving
    /// the buffer empty. The spill file (if any) is removed afterward.
    pub fn drain_all(&mut self) -> Result<Vec<Vec<Option<String>>>, TabulonError> {
        let mut out = std::mem::take(&mut self.in_memory);

        if let Some(path) = self.spill_path.take() {
            self.spill_file = None;
            let file = File::open(&path).map_err(|e| io_err(&path, e))?;
            for line in BufReader::new(file).lines() {
                let line = line.map_err(|e| io_err(&path, e))?;
                let row: Vec<Option<String>> = serde_json::from_str(&line).map_err(|e| TabulonError::Storage(e.to_string()))?;
                out.push(row);
            }
            let _ = std::fs::remove_file(&path);
            self.spilled_rows = 0;
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_within_threshold_stay_resident() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = SpillBuffer::new(10, dir.path());
        for i in 0..5 {
            buf.push(vec![Some(i.to_string())], dir.path()).unwrap();
        }
        assert_eq!(buf.resident_rows(), 5);
        assert_eq!(buf.spilled_rows(), 0);
    }

    #[test]
    fn rows_past_threshold_spill_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = SpillBuffer::new(2, dir.path());
        for i in 0..5 {
            buf.push(vec![Some(i.to_string())], dir.path()).unwrap();
        }
        assert_eq!(buf.resident_rows(), 2);
        assert_eq!(buf.spilled_rows(), 3);
    }

    #[test]
    fn drain_all_returns_rows_in_order_and_clears_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = SpillBuffer::new(2, dir.path());
        for i in 0..5 {
            buf.push(vec![Some(i.to_string())], dir.path()).unwrap();
        }
        let drained = buf.drain_all().unwrap();
        assert_eq!(drained.len(), 5);
        assert_eq!(drained[0][0], Some("0".to_string()));
        assert_eq!(drained[4][0], Some("4".to_string()));
        assert_eq!(buf.spilled_rows(), 0);
    }

    #[test]
    fn total_spilled_rows_accumulates_across_multiple_drains() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = SpillBuffer::new(2, dir.path());
        for i in 0..5 {
            buf.push(vec![Some(i.to_string())], dir.path()).unwrap();
        }
        buf.drain_all().unwrap();
        assert_eq!(buf.spilled_rows(), 0);
        assert_eq!(buf.total_spilled_rows(), 3);

        for i in 0..4 {
            buf.push(vec![Some(i.to_string())], dir.path()).unwrap();
        }
        buf.drain_all().unwrap();
        assert_eq!(buf.total_spilled_rows(), 5);
    }
}
