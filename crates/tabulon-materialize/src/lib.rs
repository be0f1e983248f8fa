//! Checkpointed Materialization (spec.md §4.H, §4.I, §4.J): writer adapters
//! for CSV/TSV, Parquet, and embedded SQL, back-pressure via spill-to-disk,
//! ETA tracking, a durable checkpoint registry, and the job state machine
//! gating phase transitions.

pub mod checkpoint;
pub mod csv_writer;
pub mod eta;
pub mod parquet_writer;
pub mod scheduler;
pub mod spill;
pub mod sql_writer;
pub mod state_machine;
pub mod writer;

pub use checkpoint::CheckpointRegistry;
pub use csv_writer::CsvWriterAdapter;
pub use eta::EtaTracker;
pub use parquet_writer::ParquetWriterAdapter;
pub use scheduler::{materialize_all, materialize_schema, OutputFormat, SchemaMaterializeSpec, MAX_CONCURRENT_SCHEMA_TASKS};
pub use spill::SpillBuffer;
pub use sql_writer::SqlWriterAdapter;
pub use state_machine::JobStateMachine;
pub use writer::WriterAdapter;
