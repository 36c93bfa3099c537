//! Schema registry.
//!
//! Holds the compiled schemas for all known document types. The bundled
//! schema file covers invoices, contracts and service-delivery records;
//! additional or replacement schemas can be loaded from disk.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::schema::spec::SchemaFile;
use crate::schema::DocumentSchema;

/// Schema definitions shipped with the library.
const BUILTIN_SCHEMAS: &str = include_str!("../../schemas/default.json");

/// A set of compiled document schemas, keyed by document type.
#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<DocumentSchema>>,
}

impl SchemaRegistry {
    /// Compiles the bundled schema definitions.
    pub fn builtin() -> Result<Self> {
        let file: SchemaFile = serde_json::from_str(BUILTIN_SCHEMAS)
            .map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::from_specs(file)
    }

    /// Loads and compiles schema definitions from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let file: SchemaFile =
            serde_json::from_str(&content).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::from_specs(file)
    }

    /// Compiles an already-parsed schema file.
    pub fn from_specs(file: SchemaFile) -> Result<Self> {
        let mut schemas = BTreeMap::new();
        for (name, spec) in file {
            let schema = DocumentSchema::compile(&name, spec)?;
            debug!(
                document_type = %name,
                fields = schema.fields.len(),
                rules = schema.rules.len(),
                "compiled schema"
            );
            schemas.insert(name, Arc::new(schema));
        }
        Ok(SchemaRegistry { schemas })
    }

    /// Looks up the schema for a document type.
    pub fn get(&self, document_type: &str) -> Result<Arc<DocumentSchema>> {
        self.schemas
            .get(document_type)
            .cloned()
            .ok_or_else(|| SchemaError::NotFound(document_type.to_string()).into())
    }

    /// Registered document type names, in sorted order.
    pub fn document_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_schemas_compile() {
        let registry = SchemaRegistry::builtin().unwrap();
        let types: Vec<&str> = registry.document_types().collect();
        assert_eq!(types, vec!["contract", "invoice", "service_delivery_record"]);
    }

    #[test]
    fn test_builtin_invoice_schema_shape() {
        let registry = SchemaRegistry::builtin().unwrap();
        let invoice = registry.get("invoice").unwrap();
        assert!(invoice.table.is_some());
        assert!(!invoice.rules.is_empty());
        assert!(invoice.chains.is_empty());

        let contract = registry.get("contract").unwrap();
        assert_eq!(contract.chains.len(), 2);
        assert_eq!(contract.chains[0].anchor, "provider_info_intro");
    }

    #[test]
    fn test_unknown_document_type() {
        let registry = SchemaRegistry::builtin().unwrap();
        let err = registry.get("purchase_order").unwrap_err();
        assert!(err.to_string().contains("purchase_order"));
    }
}
