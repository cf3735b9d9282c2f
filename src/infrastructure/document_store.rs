//! In-memory document store adapter.
//!
//! Useful when the catalog collaborator hands over preloaded document
//! bodies, and as the standard test double for the `DocumentStore` port.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::models::CatalogEntry;
use crate::domain::ports::DocumentStore;

/// Name -> document body store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: HashMap<String, String>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, document: impl Into<String>) {
        self.documents.insert(name.into(), document.into());
    }

    pub fn with_document(mut self, name: impl Into<String>, document: impl Into<String>) -> Self {
        self.insert(name, document);
        self
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn load(&self, entry: &CatalogEntry) -> Result<String> {
        self.documents
            .get(&entry.name)
            .cloned()
            .ok_or_else(|| anyhow!("no document stored for policy '{}'", entry.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            category: "other".to_string(),
            description: String::new(),
            location: format!("{name}.yaml"),
            tags: vec![],
            has_example_tests: false,
        }
    }

    #[tokio::test]
    async fn test_load_roundtrip() {
        let store = InMemoryDocumentStore::new().with_document("require-probes", "kind: Policy");
        let document = store.load(&entry("require-probes")).await.unwrap();
        assert_eq!(document, "kind: Policy");
    }

    #[tokio::test]
    async fn test_missing_document_errors() {
        let store = InMemoryDocumentStore::new();
        assert!(store.load(&entry("absent")).await.is_err());
    }
}
