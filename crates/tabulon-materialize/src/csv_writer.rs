//! CSV/TSV writer adapter (spec.md §4.I): one physical file per chunk,
//! named `<stem>.partNNNN.<ext>`, each carrying its own header. Rotation
//! writes to a temp file in the same directory and renames it into place so
//! a crash mid-rotation never leaves a half-written chunk visible.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tabulon_error::TabulonError;

use crate::writer::WriterAdapter;

pub struct CsvWriterAdapter {
    base_path: PathBuf,
    chunk_rows: u64,
    delimiter: u8,
    chunk_ordinal: u32,
    column_names: Vec<String>,
    current: Option<csv::Writer<File>>,
    current_tmp_path: Option<PathBuf>,
    current_final_path: Option<PathBuf>,
    rows_in_chunk: u64,
}

impl CsvWriterAdapter {
    #[must_use]
    pub fn new(base_path: PathBuf, chunk_rows: u64, delimiter: u8) -> Self {
        Self {
            base_path,
            chunk_rows: chunk_rows.max(1),
            delimiter,
            chunk_ordinal: 0,
            column_names: Vec::new(),
            current: None,
            current_tmp_path: None,
            current_final_path: None,
            rows_in_chunk: 0,
        }
    }

    fn chunk_path(&self, ordinal: u32) -> PathBuf {
        let stem = self.base_path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
        let ext = self.base_path.extension().and_then(|s| s.to_str()).unwrap_or("csv");
        self.base_path
            .with_file_name(format!("{stem}.part{ordinal:05}.{ext}"))
    }

    fn tmp_chunk_path(&self, ordinal: u32) -> PathBuf {
        let mut name = self.chunk_path(ordinal).into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Open chunk `ordinal` for writing. The chunk's bytes accumulate in a
    /// sibling `.tmp` file; the final, publicly visible chunk path is only
    /// ever replaced atomically via [`Self::publish_current`], so a crash
    /// mid-write leaves the previous good chunk (or nothing) in place, never
    /// a half-written one. If the final chunk already has content (a resumed
    /// or reopened writer), that content is staged into the tmp file first so
    /// further rows append after it without duplicating the header.
    fn open_chunk(&mut self, ordinal: u32) -> Result<(), TabulonError> {
        let path = self.chunk_path(ordinal);
        let tmp_path = self.tmp_chunk_path(ordinal);
        let already_has_content = path.exists() && fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);

        if already_has_content {
            fs::copy(&path, &tmp_path).map_err(|e| TabulonError::Io { path: tmp_path.clone(), source: e })?;
        } else if tmp_path.exists() {
            let _ = fs::remove_file(&tmp_path);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&tmp_path)
            .map_err(|e| TabulonError::Io { path: tmp_path.clone(), source: e })?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_writer(file);

        if !already_has_content && !self.column_names.is_empty() {
            writer
                .write_record(&self.column_names)
                .map_err(|e| TabulonError::Storage(format!("csv header write failed: {e}")))?;
        }

        self.current = Some(writer);
        self.current_tmp_path = Some(tmp_path);
        self.current_final_path = Some(path);
        self.rows_in_chunk = 0;
        Ok(())
    }

    /// Flush and rename the currently open chunk's tmp file into its final,
    /// visible path. A no-op if nothing is open.
    fn publish_current(&mut self) -> Result<(), TabulonError> {
        let Some(mut writer) = self.current.take() else {
            return Ok(());
        };
        let tmp_path = self
            .current_tmp_path
            .take()
            .expect("tmp path is always set alongside an open writer");
        let final_path = self
            .current_final_path
            .take()
            .expect("final path is always set alongside an open writer");

        writer.flush().map_err(|e| TabulonError::Io { path: tmp_path.clone(), source: e })?;
        drop(writer);
        fs::rename(&tmp_path, &final_path).map_err(|e| TabulonError::Io { path: final_path, source: e })?;
        Ok(())
    }
}

impl WriterAdapter for CsvWriterAdapter {
    fn open(&mut self, column_names: &[String]) -> Result<(), TabulonError> {
        self.column_names = column_names.to_vec();
        if let Some(parent) = self.base_path.parent() {
            fs::create_dir_all(parent).map_err(|e| TabulonError::Io { path: parent.to_path_buf(), source: e })?;
        }
        self.open_chunk(self.chunk_ordinal)
    }

    fn write_rows(&mut self, rows: &[Vec<Option<String>>]) -> Result<(), TabulonError> {
        for row in rows {
            if self.rows_in_chunk >= self.chunk_rows {
                self.rotate()?;
            }
            let writer = self.current.as_mut().ok_or_else(|| TabulonError::Storage("writer not open".into()))?;
            let fields: Vec<String> = row.iter().map(|c| c.clone().unwrap_or_default()).collect();
            writer
                .write_record(&fields)
                .map_err(|e| TabulonError::Storage(format!("csv row write failed: {e}")))?;
            self.rows_in_chunk += 1;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), TabulonError> {
        self.publish_current()?;
        self.chunk_ordinal += 1;
        self.open_chunk(self.chunk_ordinal)
    }

    fn close(&mut self) -> Result<(), TabulonError> {
        self.publish_current()
    }

    fn rows_in_current_chunk(&self) -> u64 {
        self.rows_in_chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_once_and_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("out.csv");
        let mut adapter = CsvWriterAdapter::new(base.clone(), 1000, b',');
        adapter.open(&["a".to_string(), "b".to_string()]).unwrap();
        adapter
            .write_rows(&[vec![Some("1".to_string()), Some("2".to_string())]])
            .unwrap();
        adapter.close().unwrap();

        let content = fs::read_to_string(dir.path().join("out.part00000.csv")).unwrap();
        assert_eq!(content, "a,b\n1,2\n");
    }

    #[test]
    fn rotates_into_a_new_numbered_chunk_at_the_row_cap() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("out.csv");
        let mut adapter = CsvWriterAdapter::new(base, 2, b',');
        adapter.open(&["x".to_string()]).unwrap();
        adapter
            .write_rows(&[
                vec![Some("1".to_string())],
                vec![Some("2".to_string())],
                vec![Some("3".to_string())],
            ])
            .unwrap();
        adapter.close().unwrap();

        assert!(dir.path().join("out.part00000.csv").exists());
        assert!(dir.path().join("out.part00001.csv").exists());
    }

    #[test]
    fn reopening_an_existing_chunk_does_not_duplicate_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("out.csv");
        {
            let mut adapter = CsvWriterAdapter::new(base.clone(), 1000, b',');
            adapter.open(&["a".to_string()]).unwrap();
            adapter.write_rows(&[vec![Some("1".to_string())]]).unwrap();
            adapter.close().unwrap();
        }
        {
            let mut adapter = CsvWriterAdapter::new(base.clone(), 1000, b',');
            adapter.open(&["a".to_string()]).unwrap();
            adapter.write_rows(&[vec![Some("2".to_string())]]).unwrap();
            adapter.close().unwrap();
        }
        let content = fs::read_to_string(dir.path().join("out.part00000.csv")).unwrap();
        assert_eq!(content, "a\n1\n2\n");
    }

    #[test]
    fn closing_leaves_no_tmp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("out.csv");
        let mut adapter = CsvWriterAdapter::new(base, 1000, b',');
        adapter.open(&["a".to_string()]).unwrap();
        adapter.write_rows(&[vec![Some("1".to_string())]]).unwrap();
        adapter.close().unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".tmp")), "leftover tmp file in {names:?}");
    }
}
