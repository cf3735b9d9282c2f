//! Infrastructure layer: backend adapters, configuration loading, logging.

pub mod backends;
pub mod config;
pub mod document_store;
pub mod logging;

pub use document_store::InMemoryDocumentStore;
