//! Canonical schema registry (spec.md §4.G): an in-memory store of
//! `CanonicalSchema` contracts keyed by `(namespace, id, version)`, backed
//! durably by `tabulon-storage`.

use std::collections::HashMap;

use tabulon_types::CanonicalSchema;

#[derive(Debug, Default)]
pub struct CanonicalRegistry {
    schemas: HashMap<(String, String, u32), CanonicalSchema>,
}

impl CanonicalRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: CanonicalSchema) {
        self.schemas.insert(schema.key(), schema);
    }

    #[must_use]
    pub fn get(&self, namespace: &str, id: &str, version: u32) -> Option<&CanonicalSchema> {
        self.schemas.get(&(namespace.to_string(), id.to_string(), version))
    }

    /// The highest registered version for a (namespace, id) pair, if any.
    #[must_use]
    pub fn latest_version(&self, namespace: &str, id: &str) -> Option<u32> {
        self.schemas
            .keys()
            .filter(|(ns, i, _)| ns == namespace && i == id)
            .map(|(_, _, v)| *v)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabulon_types::{CanonicalColumn, CanonicalDataType};

    fn schema(namespace: &str, id: &str, version: u32) -> CanonicalSchema {
        CanonicalSchema {
            namespace: namespace.to_string(),
            id: id.to_string(),
            version,
            columns: vec![CanonicalColumn {
                name: "name".to_string(),
                data_type: CanonicalDataType::Text,
                required: true,
                allow_null: false,
                allowed_values: None,
                range: None,
            }],
        }
    }

    #[test]
    fn registers_and_fetches_by_key() {
        let mut registry = CanonicalRegistry::new();
        registry.register(schema("acme", "customers", 1));
        assert!(registry.get("acme", "customers", 1).is_some());
        assert!(registry.get("acme", "customers", 2).is_none());
    }

    #[test]
    fn latest_version_tracks_highest_registered() {
        let mut registry = CanonicalRegistry::new();
        registry.register(schema("acme", "customers", 1));
        registry.register(schema("acme", "customers", 3));
        assert_eq!(registry.latest_version("acme", "customers"), Some(3));
        assert_eq!(registry.latest_version("acme", "orders"), None);
    }
}
