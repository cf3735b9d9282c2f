//! Mock completion backend for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::domain::ports::{BackendError, CompletionBackend, CompletionRequest};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Error(BackendError),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }
}

/// Mock backend with scripted replies.
///
/// Replies are consumed in order; once the script is exhausted the default
/// reply answers every further call. Call counts and received prompts are
/// recorded for assertions.
pub struct MockBackend {
    id: String,
    script: Mutex<VecDeque<MockReply>>,
    default_reply: MockReply,
    calls: AtomicU32,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            script: Mutex::new(VecDeque::new()),
            default_reply: MockReply::text("{}"),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Backend that answers every call with the same text.
    pub fn always(id: impl Into<String>, text: impl Into<String>) -> Self {
        let mut backend = Self::new(id);
        backend.default_reply = MockReply::text(text);
        backend
    }

    /// Backend that fails every call with the given error.
    pub fn failing(id: impl Into<String>, error: BackendError) -> Self {
        let mut backend = Self::new(id);
        backend.default_reply = MockReply::Error(error);
        backend
    }

    /// Queue a reply to be consumed before the default kicks in.
    pub fn push_reply(&self, reply: MockReply) {
        self.script.lock().unwrap().push_back(reply);
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }

    /// Full requests received so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());

        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::Error(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            prompt: prompt.to_string(),
            max_tokens: 100,
            temperature: 0.1,
            model: "mock".to_string(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_scripted_replies_consumed_in_order() {
        let backend = MockBackend::new("mock");
        backend.push_reply(MockReply::text("first"));
        backend.push_reply(MockReply::Error(BackendError::RateLimited));

        assert_eq!(backend.complete(&request("a")).await.unwrap(), "first");
        assert!(backend.complete(&request("b")).await.is_err());
        // Script exhausted, default reply takes over.
        assert_eq!(backend.complete(&request("c")).await.unwrap(), "{}");
        assert_eq!(backend.call_count(), 3);
        assert_eq!(backend.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failing_backend() {
        let backend = MockBackend::failing("down", BackendError::AuthFailed);
        let err = backend.complete(&request("x")).await.unwrap_err();
        assert!(matches!(err, BackendError::AuthFailed));
    }
}
