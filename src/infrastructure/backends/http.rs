//! HTTP completion backend adapter.
//!
//! Speaks a messages-style JSON API (prompt in, text blocks out) over
//! reqwest with connection pooling. Status codes are classified into the
//! transient/permanent taxonomy consumed by the retry policy and the chain.

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::domain::ports::{BackendError, CompletionBackend, CompletionRequest};

/// Configuration for the HTTP backend adapter.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Identifier reported by `CompletionBackend::id`.
    pub id: String,
    /// Base URL of the completion service.
    pub base_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Connect/overall timeout applied when building the client.
    pub timeout_secs: u64,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            id: "http".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct WireContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    content: Vec<WireContentBlock>,
}

/// HTTP-backed completion backend.
pub struct HttpCompletionBackend {
    http_client: ReqwestClient,
    config: HttpBackendConfig,
}

impl HttpCompletionBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self, BackendError> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn classify_status(status: StatusCode, body: String) -> BackendError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimited,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::AuthFailed,
            s if s.is_server_error() => BackendError::Unavailable(format!("{s}: {body}")),
            s => BackendError::InvalidRequest(format!("{s}: {body}")),
        }
    }

    fn classify_transport(err: &reqwest::Error, timeout_secs: u64) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout(timeout_secs)
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    fn id(&self) -> &str {
        &self.config.id
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let body = WireRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![WireMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        debug!(
            backend = %self.config.id,
            model = %request.model,
            prompt_len = request.prompt.len(),
            "sending completion request"
        );

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .timeout(Duration::from_secs(request.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::classify_transport(&e, request.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error response".to_string());
            return Err(Self::classify_status(status, body));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| Self::classify_transport(&e, request.timeout_secs))?;

        let text: String = parsed
            .content
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(BackendError::EmptyResponse);
        }

        Ok(text)
    }
}
