//! Durable storage & telemetry sink (spec.md §4.K): the rusqlite-backed
//! store every phase writes through, with idempotent migrations and
//! bounded-retention progress telemetry.

mod migrations;
mod store;

pub use store::Store;
