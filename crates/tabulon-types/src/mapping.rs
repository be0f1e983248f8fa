use serde::{Deserialize, Serialize};

use crate::block::FileBlock;
use crate::ids::SchemaId;
use crate::schema::SchemaDefinition;

/// One source column's binding into canonical column order for a given file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnBinding {
    pub source_index: Option<usize>,
    pub canonical_index: usize,
    pub confidence: f64,
}

/// Per-file ordered bindings from source columns to canonical columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMapping {
    pub schema_id: SchemaId,
    pub file_path: String,
    pub bindings: Vec<ColumnBinding>,
}

/// The top-level persisted artifact produced by Analyze and refined by
/// Cluster/Normalize: `{artifact_version, schemas, blocks, schema_mapping,
/// column_profiles}` per spec. `column_profiles` is folded into `blocks` here
/// since each block already owns its own `column_profiles` vec; the field is
/// kept for parity with the on-disk `mapping.column_profiles.json` sidecar,
/// which is just a projection of `blocks[].column_profiles`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingDocument {
    pub artifact_version: u32,
    pub schemas: Vec<SchemaDefinition>,
    pub blocks: Vec<FileBlock>,
    pub schema_mapping: Vec<SchemaMapping>,
}

impl MappingDocument {
    #[must_use]
    pub fn new() -> Self {
        Self {
            artifact_version: 1,
            schemas: Vec::new(),
            blocks: Vec::new(),
            schema_mapping: Vec::new(),
        }
    }

    /// Projection used to write the `mapping.column_profiles.json` sidecar.
    #[must_use]
    pub fn column_profiles_sidecar(&self) -> Vec<(&str, &crate::profile::SchemaSignature)> {
        self.blocks
            .iter()
            .map(|b| (b.file_path.as_str(), &b.signature))
            .collect()
    }
}

impl Default for MappingDocument {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_json_preserves_equality() {
        let doc = MappingDocument::new();
        let json = serde_json::to_string(&doc).unwrap();
        let back: MappingDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(doc.artifact_version, back.artifact_version);
        assert_eq!(doc.schemas.len(), back.schemas.len());
        assert_eq!(doc.blocks.len(), back.blocks.len());
    }
}
