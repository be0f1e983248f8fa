use serde::{Deserialize, Serialize};

use crate::profile::{ColumnProfile, SchemaSignature};

/// A contiguous byte/line range sampled and profiled from one source file.
///
/// Owned by the enclosing Mapping document; never referenced by more than
/// one [`crate::schema::SchemaDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileBlock {
    pub file_path: String,
    pub start_line: u64,
    pub end_line: u64,
    pub byte_span: (u64, u64),
    pub signature: SchemaSignature,
    pub column_profiles: Vec<ColumnProfile>,
    /// Non-fatal observations raised while profiling this block (e.g. `MixedDelimiter`).
    pub warnings: Vec<BlockWarning>,
    pub short_rows: u64,
    pub long_rows: u64,
}

/// Non-fatal conditions noticed while profiling a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockWarning {
    MixedDelimiter { dominant: String },
    EncodingFallback { encoding: String },
}
