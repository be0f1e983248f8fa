//! Shared data model for the tabulon ingestion pipeline.
//!
//! Every type here is immutable once written to disk; mutation is by
//! emitting a new version (see `HeaderCluster::version`,
//! `MappingDocument::artifact_version`).

pub mod block;
pub mod canonical;
pub mod checkpoint;
pub mod cluster;
pub mod ids;
pub mod job;
pub mod mapping;
pub mod profile;
pub mod schema;
pub mod telemetry;

pub use block::{BlockWarning, FileBlock};
pub use canonical::{CanonicalColumn, CanonicalDataType, CanonicalRange, CanonicalSchema};
pub use checkpoint::{CheckpointRecord, MaterializePayload};
pub use cluster::{ClusterMember, HeaderCluster, HeaderClusterDocument, ReasonCode};
pub use ids::{Delimiter, JobId, SchemaId};
pub use job::{JobEvent, JobState, JobStatus};
pub use mapping::{ColumnBinding, MappingDocument, SchemaMapping};
pub use profile::{ColumnProfile, ColumnType, SchemaSignature, TopKEntry, TopKSketch, TypeHistogram};
pub use schema::{DiscoveredColumn, SchemaDefinition};
pub use telemetry::{FileProgress, JobMetrics, ProgressEvent};
