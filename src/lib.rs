//! Warden - Policy Selection & Customization Engine
//!
//! Warden recommends and customizes security/governance policies for a target
//! cluster. It combines a two-phase candidate-narrowing pipeline, a reasoning
//! backend chain with automatic fallback, deterministic rule-based
//! customization, and a bounded validation/repair loop.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure data models, ports, and error taxonomy
//! - **Service Layer** (`services`): The pipeline stages (filter, select,
//!   categorize, customize, validate)
//! - **Infrastructure Layer** (`infrastructure`): Backend adapters, config
//!   loading, logging
//! - **Application Layer** (`application`): The selection orchestrator
//!
//! # Example
//!
//! ```ignore
//! use warden::application::SelectionOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Wire backends, validator and document store, then run the pipeline.
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::SelectionOrchestrator;
pub use domain::errors::SelectionError;
pub use domain::models::{
    BackendDescriptor, CandidateSet, CatalogEntry, ClusterProfile, ControllerKind,
    DetectedController, EngineConfig, GovernanceRequirement, LoggingConfig, PolicyIndex,
    RequirementAnswer, SelectionEntry, SelectionOutcome, ValidationOutcome, ValidationReport,
    ValidationStatus,
};
pub use domain::ports::{
    BackendError, CompletionBackend, CompletionRequest, DocumentStore, PolicyValidator, Verdict,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{CancelFlag, ModelBackendChain};
