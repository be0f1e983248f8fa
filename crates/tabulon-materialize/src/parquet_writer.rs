//! Columnar (Parquet) writer adapter (spec.md §4.I). Every column is
//! written as a nullable UTF-8 array — canonical typing happens at
//! validation time; this adapter's job is to land exactly the rows it's
//! given, not to re-derive types.

use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema};
use arrow_array::{ArrayRef, RecordBatch, StringArray};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use tabulon_error::TabulonError;

use crate::writer::WriterAdapter;

pub struct ParquetWriterAdapter {
    base_path: PathBuf,
    chunk_rows: u64,
    chunk_ordinal: u32,
    schema: Option<Arc<Schema>>,
    current: Option<ArrowWriter<File>>,
    rows_in_chunk: u64,
}

impl ParquetWriterAdapter {
    #[must_use]
    pub fn new(base_path: PathBuf, chunk_rows: u64) -> Self {
        Self {
            base_path,
            chunk_rows: chunk_rows.max(1),
            chunk_ordinal: 0,
            schema: None,
            current: None,
            rows_in_chunk: 0,
        }
    }

    fn chunk_path(&self, ordinal: u32) -> PathBuf {
        let stem = self.base_path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
        self.base_path.with_file_name(format!("{stem}.part{ordinal:05}.parquet"))
    }

    fn open_chunk(&mut self, ordinal: u32) -> Result<(), TabulonError> {
        let path = self.chunk_path(ordinal);
        let file = File::create(&path).map_err(|e| TabulonError::Io { path: path.clone(), source: e })?;
        let schema = self.schema.clone().ok_or_else(|| TabulonError::Storage("schema not set".into()))?;
        let props = WriterProperties::builder().build();
        let writer = ArrowWriter::try_new(file, schema, Some(props))
            .map_err(|e| TabulonError::Storage(format!("parquet writer open failed: {e}")))?;
        self.current = Some(writer);
        self.rows_in_chunk = 0;
        Ok(())
    }
}

impl WriterAdapter for ParquetWriterAdapter {
    fn open(&mut self, column_names: &[String]) -> Result<(), TabulonError> {
        if let Some(parent) = self.base_path.parent() {
            fs::create_dir_all(parent).map_err(|e| TabulonError::Io { path: parent.to_path_buf(), source: e })?;
        }
        let fields: Vec<Field> = column_names
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect();
        self.schema = Some(Arc::new(Schema::new(fields)));
        self.open_chunk(self.chunk_ordinal)
    }

    fn write_rows(&mut self, rows: &[Vec<Option<String>>]) -> Result<(), TabulonError> {
        if rows.is_empty() {
            return Ok(());
        }
        let schema = self.schema.clone().ok_or_else(|| TabulonError::Storage("schema not set".into()))?;
        let column_count = schema.fields().len();

        let mut remaining = rows;
        while !remaining.is_empty() {
            if self.rows_in_chunk >= self.chunk_rows {
                self.rotate()?;
            }
            let take = ((self.chunk_rows - self.rows_in_chunk) as usize).min(remaining.len());
            let (batch_rows, rest) = remaining.split_at(take);

            let mut columns: Vec<ArrayRef> = Vec::with_capacity(column_count);
            for col_idx in 0..column_count {
                let values: Vec<Option<String>> = batch_rows
                    .iter()
                    .map(|row| row.get(col_idx).cloned().unwrap_or(None))
                    .collect();
                columns.push(Arc::new(StringArray::from(values)));
            }
            let batch = RecordBatch::try_new(schema.clone(), columns)
                .map_err(|e| TabulonError::Storage(format!("record batch build failed: {e}")))?;

            let writer = self.current.as_mut().ok_or_else(|| TabulonError::Storage("writer not open".into()))?;
            writer
                .write(&batch)
                .map_err(|e| TabulonError::Storage(format!("parquet row-group write failed: {e}")))?;
            self.rows_in_chunk += batch_rows.len() as u64;
            remaining = rest;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), TabulonError> {
        if let Some(writer) = self.current.take() {
            writer
                .close()
                .map_err(|e| TabulonError::Storage(format!("parquet chunk close failed: {e}")))?;
        }
        self.chunk_ordinal += 1;
        self.open_chunk(self.chunk_ordinal)
    }

    fn close(&mut self) -> Result<(), TabulonError> {
        if let Some(writer) = self.current.take() {
            writer
                .close()
                .map_err(|e| TabulonError::Storage(format!("parquet chunk close failed: {e}")))?;
        }
        Ok(())
    }

    fn rows_in_current_chunk(&self) -> u64 {
        self.rows_in_chunk
    }
}
