//! Model backend chain: ordered fallback across reasoning backends.
//!
//! One small state machine per call: attempt -> retry-or-advance ->
//! exhausted. Transient failures retry on the same backend with exponential
//! backoff; permanent failures advance immediately. The chain is the only
//! component allowed to raise `AllBackendsExhausted`.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::errors::SelectionError;
use crate::domain::models::BackendDescriptor;
use crate::domain::ports::{CompletionBackend, CompletionRequest};
use crate::infrastructure::backends::RetryPolicy;

/// A successful completion, tagged with the backend that produced it.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub backend_id: String,
}

/// Ordered fallback chain over the configured backend descriptors.
pub struct ModelBackendChain {
    links: Vec<(BackendDescriptor, Arc<dyn CompletionBackend>)>,
    retry: RetryPolicy,
    request_timeout_secs: u64,
}

impl ModelBackendChain {
    /// Pair descriptors with their backend implementations, in fallback
    /// order. The first link is the primary.
    pub fn new(
        links: Vec<(BackendDescriptor, Arc<dyn CompletionBackend>)>,
        retry: RetryPolicy,
        request_timeout_secs: u64,
    ) -> Self {
        Self {
            links,
            retry,
            request_timeout_secs,
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Issue one logical completion request.
    ///
    /// `max_tokens` is clamped to each descriptor's limit; `temperature`
    /// overrides the descriptor's value when given. Atomic from the caller's
    /// perspective: the first successful response wins, and
    /// `AllBackendsExhausted` is returned only after every backend failed.
    pub async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<Completion, SelectionError> {
        let mut last_error = "no backends configured".to_string();

        for (descriptor, backend) in &self.links {
            let request = CompletionRequest {
                prompt: prompt.to_string(),
                max_tokens: max_tokens.min(descriptor.max_tokens),
                temperature: temperature.unwrap_or(descriptor.temperature),
                model: descriptor.model.clone(),
                timeout_secs: self.request_timeout_secs,
            };

            debug!(backend = %descriptor.id, "attempting completion");

            match self.retry.execute(|| backend.complete(&request)).await {
                Ok(text) if !text.trim().is_empty() => {
                    debug!(backend = %descriptor.id, "completion succeeded");
                    return Ok(Completion {
                        text,
                        backend_id: descriptor.id.clone(),
                    });
                }
                Ok(_) => {
                    warn!(backend = %descriptor.id, "backend returned empty text, advancing");
                    last_error = "empty response".to_string();
                }
                Err(err) => {
                    warn!(backend = %descriptor.id, error = %err, "backend failed, advancing");
                    last_error = err.to_string();
                }
            }
        }

        Err(SelectionError::AllBackendsExhausted {
            attempted: self.links.len(),
            last_error,
        })
    }
}
