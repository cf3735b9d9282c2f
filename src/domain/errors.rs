//! Domain errors for the policy selection engine.

use thiserror::Error;

/// Errors raised by the selection pipeline.
///
/// Everything except `Configuration` degrades gracefully: the orchestrator
/// either falls back to a deterministic path or records the failure in the
/// result manifest instead of aborting.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// Invalid engine configuration (zero target, empty backend chain,
    /// empty catalog). Fatal: no partial pipeline run is attempted.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Every backend in the chain was tried and failed. This is the single
    /// trigger for emergency rule-based selection.
    #[error("All {attempted} reasoning backends exhausted, last error: {last_error}")]
    AllBackendsExhausted {
        attempted: usize,
        last_error: String,
    },

    /// A policy document could not be parsed as structured text during
    /// customization. The entry is excluded and the name reported.
    #[error("Malformed policy document '{name}': {reason}")]
    MalformedDocument { name: String, reason: String },

    /// The pipeline was cancelled between stages or entries.
    #[error("Selection cancelled")]
    Cancelled,
}

impl SelectionError {
    /// True when the error is the backend-exhaustion signal that permits
    /// emergency selection.
    pub fn is_backend_exhausted(&self) -> bool {
        matches!(self, SelectionError::AllBackendsExhausted { .. })
    }
}
