//! Embedded-SQL writer adapter (spec.md §4.I): rows land in a single
//! rusqlite database file. There's no separate physical file per chunk
//! here, so "rotation" means committing the open transaction and starting
//! a fresh one — the unit of atomicity the backend actually offers.

use std::path::PathBuf;

use rusqlite::Connection;

use tabulon_error::TabulonError;

use crate::writer::WriterAdapter;

pub struct SqlWriterAdapter {
    path: PathBuf,
    table_name: String,
    chunk_rows: u64,
    conn: Option<Connection>,
    rows_in_chunk: u64,
}

fn sanitize_identifier(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.is_empty() || out.chars().next().unwrap().is_ascii_digit() {
        out = format!("c_{out}");
    }
    out
}

fn storage_err(e: impl std::fmt::Display) -> TabulonError {
    TabulonError::Storage(e.to_string())
}

impl SqlWriterAdapter {
    #[must_use]
    pub fn new(path: PathBuf, table_name: String, chunk_rows: u64) -> Self {
        Self {
            path,
            table_name: sanitize_identifier(&table_name),
            chunk_rows: chunk_rows.max(1),
            conn: None,
            rows_in_chunk: 0,
        }
    }
}

impl WriterAdapter for SqlWriterAdapter {
    fn open(&mut self, column_names: &[String]) -> Result<(), TabulonError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TabulonError::Io { path: parent.to_path_buf(), source: e })?;
        }
        let conn = Connection::open(&self.path).map_err(|e| TabulonError::Io {
            path: self.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?;

        let columns_sql: Vec<String> = column_names.iter().map(|c| format!("{} TEXT", sanitize_identifier(c))).collect();
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                self.table_name,
                columns_sql.join(", ")
            ),
            [],
        )
        .map_err(storage_err)?;

        conn.execute_batch("BEGIN").map_err(storage_err)?;
        self.conn = Some(conn);
        self.rows_in_chunk = 0;
        Ok(())
    }

    fn write_rows(&mut self, rows: &[Vec<Option<String>>]) -> Result<(), TabulonError> {
        let conn = self.conn.as_ref().ok_or_else(|| TabulonError::Storage("writer not open".into()))?;
        for row in rows {
            if self.rows_in_chunk >= self.chunk_rows {
                self.rotate()?;
            }
            let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT INTO {} VALUES ({})",
                self.table_name,
                placeholders.join(", ")
            );
            let params: Vec<&dyn rusqlite::ToSql> = row.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
            conn.execute(&sql, params.as_slice()).map_err(storage_err)?;
            self.rows_in_chunk += 1;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), TabulonError> {
        if let Some(conn) = &self.conn {
            conn.execute_batch("COMMIT").map_err(storage_err)?;
            conn.execute_batch("BEGIN").map_err(storage_err)?;
        }
        self.rows_in_chunk = 0;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TabulonError> {
        if let Some(conn) = self.conn.take() {
            conn.execute_batch("COMMIT").map_err(storage_err)?;
        }
        Ok(())
    }

    fn rows_in_current_chunk(&self) -> u64 {
        self.rows_in_chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_rows_into_a_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sqlite");
        let mut adapter = SqlWriterAdapter::new(path.clone(), "customers".to_string(), 1000);
        adapter.open(&["name".to_string(), "age".to_string()]).unwrap();
        adapter
            .write_rows(&[vec![Some("Alice".to_string()), Some("30".to_string())]])
            .unwrap();
        adapter.close().unwrap();

        let conn = Connection::open(&path).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM customers", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn sanitizes_identifiers_with_punctuation() {
        assert_eq!(sanitize_identifier("customer-name"), "customer_name");
        assert_eq!(sanitize_identifier("123abc"), "c_123abc");
    }
}
