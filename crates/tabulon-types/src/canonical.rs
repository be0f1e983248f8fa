use serde::{Deserialize, Serialize};

/// A single column's contract within a `CanonicalSchema`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalColumn {
    pub name: String,
    pub data_type: CanonicalDataType,
    pub required: bool,
    pub allow_null: bool,
    pub allowed_values: Option<Vec<String>>,
    pub range: Option<CanonicalRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanonicalDataType {
    Int,
    Decimal,
    Bool,
    Date,
    Text,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CanonicalRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// The external contract a cluster of columns gets bound to: namespace,
/// id and version identify it uniquely in the canonical schema store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalSchema {
    pub namespace: String,
    pub id: String,
    pub version: u32,
    pub columns: Vec<CanonicalColumn>,
}

impl CanonicalSchema {
    #[must_use]
    pub fn key(&self) -> (String, String, u32) {
        (self.namespace.clone(), self.id.clone(), self.version)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&CanonicalColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}
