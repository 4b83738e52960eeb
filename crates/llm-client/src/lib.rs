//! Language-model client for the recommendation backend.
//!
//! This crate provides the `LanguageModel` seam the pipeline calls through,
//! plus an HTTP implementation that talks to the backend's chat endpoints:
//! - Hosted provider: `POST {base}/run-groq` with `{"messages": [...]}`
//! - Local provider: `POST {base}/run-local-gemma` with `{"messages": [...], "model": ...}`
//!
//! Both answer `{"response": text}` on success and `{"error": text}` with a
//! non-2xx status on failure. No retries are performed here; callers decide
//! how a failure is absorbed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use domain::{Message, ModelProvider};

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

/// Errors that can occur when calling the language model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmClientError {
    #[error("Language model unavailable: {0}")]
    Unavailable(String),

    #[error("Language model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Language model backend error (status {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Invalid response from language model: {0}")]
    InvalidResponse(String),
}

impl LlmClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LlmClientError::Timeout(_))
    }
}

/// A chat-style language model: a message list in, a text reply out.
///
/// `Send + Sync` so one instance can be shared behind an `Arc` by the
/// extractor and the refiner.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion over `messages`
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmClientError>;

    /// Which deployment this model talks to (for logging)
    fn provider(&self) -> ModelProvider;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the backend's language-model endpoints.
#[derive(Debug, Clone)]
pub struct HttpLanguageModel {
    client: Client,
    base_url: String,
    provider: ModelProvider,
    timeout: Option<Duration>,
}

impl HttpLanguageModel {
    /// Create a client without a request timeout. The turn orchestrator
    /// puts its own deadline around every stage.
    ///
    /// # Arguments
    /// * `base_url` - Backend address (e.g., "http://localhost:5000")
    /// * `provider` - Hosted or local deployment
    pub fn new(base_url: impl Into<String>, provider: ModelProvider) -> Result<Self, LlmClientError> {
        Self::build(base_url.into(), provider, None)
    }

    /// Create a client whose requests fail with `Timeout` after `timeout`.
    pub fn with_timeout(
        base_url: impl Into<String>,
        provider: ModelProvider,
        timeout: Duration,
    ) -> Result<Self, LlmClientError> {
        Self::build(base_url.into(), provider, Some(timeout))
    }

    fn build(
        base_url: String,
        provider: ModelProvider,
        timeout: Option<Duration>,
    ) -> Result<Self, LlmClientError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        info!("Language model client for {} at {}", provider.label(), base_url);

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| LlmClientError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            provider,
            timeout,
        })
    }

    /// Endpoint URL for the configured provider
    fn endpoint(&self) -> String {
        match self.provider {
            ModelProvider::Hosted => format!("{}/run-groq", self.base_url),
            ModelProvider::Local { .. } => format!("{}/run-local-gemma", self.base_url),
        }
    }

    /// Get the backend address this client calls.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmClientError> {
        let request = ChatRequest {
            messages,
            model: match &self.provider {
                ModelProvider::Hosted => None,
                ModelProvider::Local { model } => Some(model.as_str()),
            },
        };
        let url = self.endpoint();
        debug!("Sending {} messages to {}", messages.len(), url);

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            if e.is_timeout() {
                error!("Language model call to {} timed out", url);
                LlmClientError::Timeout(self.timeout.unwrap_or_default())
            } else {
                error!("Language model call to {} failed: {}", url, e);
                LlmClientError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                LlmClientError::Timeout(self.timeout.unwrap_or_default())
            } else {
                LlmClientError::Unavailable(format!("Failed to read response: {}", e))
            }
        })?;

        let parsed = serde_json::from_str::<ChatResponse>(&body);

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(body);
            error!("Language model backend returned {}: {}", status, message);
            return Err(LlmClientError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        match parsed {
            Ok(ChatResponse {
                response: Some(text),
                ..
            }) => {
                debug!("Language model replied with {} characters", text.len());
                Ok(text)
            }
            Ok(ChatResponse {
                error: Some(message),
                ..
            }) => Err(LlmClientError::Backend {
                status: status.as_u16(),
                message,
            }),
            Ok(_) => Err(LlmClientError::InvalidResponse(
                "response field missing".to_string(),
            )),
            Err(e) => Err(LlmClientError::InvalidResponse(e.to_string())),
        }
    }

    fn provider(&self) -> ModelProvider {
        self.provider.clone()
    }
}
