//! tabulon samples a directory of CSV/TSV files, profiles their columns,
//! clusters similar headers across files, binds them to a canonical schema,
//! and materializes the normalized rows to CSV, Parquet, or an embedded
//! database — all resumable from durable checkpoints.
//!
//! The heavy lifting lives in the `tabulon-*` library crates; this crate is
//! the command-line shell that composes them into the five pipeline verbs.

pub mod cli;
