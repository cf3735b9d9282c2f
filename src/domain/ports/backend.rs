//! Completion backend port - interface to reasoning backends.
//!
//! A backend is anything that can complete a prompt: a hosted model API, a
//! local model, or a scripted mock. The chain in `services::chain` walks the
//! configured descriptors and drives implementations of this port; nothing
//! else in the engine talks to a backend directly.

use async_trait::async_trait;
use thiserror::Error;

/// A single completion request. Atomic from the caller's perspective; no
/// streaming or partial results.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Output-size ceiling; the chain clamps this to the descriptor's limit.
    pub max_tokens: u32,
    pub temperature: f32,
    /// Model name from the active backend descriptor.
    pub model: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

/// Errors a single backend can produce.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Rate limit hit; retried with backoff.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Call exceeded its timeout; retried.
    #[error("Request timeout after {0}s")]
    Timeout(u64),

    /// Service-side failure (5xx or equivalent); retried.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Transport-level failure; retried.
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials rejected; the chain advances immediately.
    #[error("Authentication failed")]
    AuthFailed,

    /// Request permanently rejected; the chain advances immediately.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The backend answered with no usable text.
    #[error("Empty response from backend")]
    EmptyResponse,
}

impl BackendError {
    /// Returns true if this error is transient and should be retried on the
    /// same backend before the chain advances.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::RateLimited
                | BackendError::Timeout(_)
                | BackendError::Unavailable(_)
                | BackendError::Network(_)
        )
    }
}

/// Port trait for reasoning backend implementations.
///
/// Implementations must be `Send + Sync` for concurrent use across tokio
/// tasks. Provider-specific authentication and transport stay behind this
/// trait; the engine only sees prompt in, text out.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Stable identifier for logs and the result manifest.
    fn id(&self) -> &str;

    /// Complete a prompt, returning the full response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(BackendError::RateLimited.is_transient());
        assert!(BackendError::Timeout(60).is_transient());
        assert!(BackendError::Unavailable("503".to_string()).is_transient());
        assert!(BackendError::Network("connection reset".to_string()).is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(!BackendError::AuthFailed.is_transient());
        assert!(!BackendError::InvalidRequest("bad prompt".to_string()).is_transient());
        assert!(!BackendError::EmptyResponse.is_transient());
    }
}
