//! Writer Adapter contract (spec.md §4.I): every materialization backend —
//! delimited text, columnar, embedded SQL — implements the same
//! open/write_rows/rotate/close lifecycle so the scheduler never special-
//! cases a destination kind.

use tabulon_error::TabulonError;

pub trait WriterAdapter: Send {
    /// Open (or resume) the destination. Implementations must be idempotent
    /// against a prior partial write: resuming never re-emits a header or
    /// duplicates already-flushed rows.
    fn open(&mut self, column_names: &[String]) -> Result<(), TabulonError>;

    fn write_rows(&mut self, rows: &[Vec<Option<String>>]) -> Result<(), TabulonError>;

    /// Close the current physical output and atomically begin a new one.
    fn rotate(&mut self) -> Result<(), TabulonError>;

    /// Flush and close the current physical output; no further writes are valid.
    fn close(&mut self) -> Result<(), TabulonError>;

    /// Rows written to the currently open chunk (resets on `rotate`).
    fn rows_in_current_chunk(&self) -> u64;
}
