//! Document store port - how the engine obtains policy document bodies.
//!
//! The catalog collaborator owns storage; the engine only ever asks for the
//! document behind a catalog entry's location.

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::models::CatalogEntry;

/// Port trait for loading policy documents from the catalog.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load the raw document text for a catalog entry.
    async fn load(&self, entry: &CatalogEntry) -> Result<String>;
}
