use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::SchemaId;

/// A column discovered during analysis, prior to canonical binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredColumn {
    pub index: usize,
    pub name: Option<String>,
}

/// One detected latent schema, spanning one or more source files' blocks.
///
/// Invariant: every block id referenced here belongs to exactly one
/// `SchemaDefinition` across the whole Mapping document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub schema_id: SchemaId,
    pub columns: Vec<DiscoveredColumn>,
    /// file_path -> ordered block indices (into the Mapping document's `blocks` vec)
    pub blocks_by_file: BTreeMap<String, Vec<usize>>,
    pub confidence: f64,
    pub canonical_schema_id: Option<String>,
    pub canonical_schema_version: Option<u32>,
}

impl SchemaDefinition {
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.canonical_schema_id.is_some() && self.canonical_schema_version.is_some()
    }
}
