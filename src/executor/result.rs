//! Result types for federated query execution

use std::collections::HashMap;

use serde_json::Value;

use crate::query::SchemaRef;

/// One joined record, keyed by the shared identifier.
///
/// A data entry exists only if that schema produced a record for the id;
/// LEFT and FULL joins may leave gaps.
#[derive(Debug, Clone)]
pub struct CrossSchemaResult {
    /// Shared identifier.
    pub id: String,
    /// Per-schema data sections.
    data: HashMap<SchemaRef, Value>,
}

impl CrossSchemaResult {
    /// Creates an empty result for an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: HashMap::new(),
        }
    }

    /// Attaches a schema's record.
    pub fn insert(&mut self, schema: SchemaRef, record: Value) {
        self.data.insert(schema, record);
    }

    /// Returns the schema's record, if that schema produced one.
    pub fn record(&self, schema: &SchemaRef) -> Option<&Value> {
        self.data.get(schema)
    }

    /// Returns true if the schema produced a record for this id.
    pub fn has(&self, schema: &SchemaRef) -> bool {
        self.data.contains_key(schema)
    }

    /// Returns the schemas that produced data.
    pub fn schemas(&self) -> impl Iterator<Item = &SchemaRef> {
        self.data.keys()
    }

    /// Number of populated sections.
    pub fn section_count(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sections_present_only_when_inserted() {
        let mut result = CrossSchemaResult::new("id-1");
        result.insert(SchemaRef::new("accounts"), json!({"name": "Alice"}));

        assert!(result.has(&SchemaRef::new("accounts")));
        assert!(!result.has(&SchemaRef::new("inventory")));
        assert_eq!(
            result.record(&SchemaRef::new("accounts")),
            Some(&json!({"name": "Alice"}))
        );
        assert_eq!(result.section_count(), 1);
    }
}
