//! Provider trait definitions for completion backends

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request for a completion from a backend
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
}

impl CompletionRequest {
    /// Single user-role message for `model`
    pub fn user_prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user(prompt)],
            temperature: super::DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }
}

/// Response from a backend
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// First choice's message content, trimmed
    pub content: String,
    pub model: String,
    /// Backend-reported total for this single call
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub finish_reason: String,
    pub latency_ms: u64,
}

impl CompletionResponse {
    /// Minimal response, mostly useful for stub backends
    pub fn text(model: impl Into<String>, content: impl Into<String>, total_tokens: u64) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            total_tokens,
            prompt_tokens: 0,
            completion_tokens: 0,
            finish_reason: "stop".to_string(),
            latency_ms: 0,
        }
    }
}

/// Error types for backend calls
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for completion backends.
///
/// Implementations issue exactly one request per call and never retry;
/// the retry policy belongs to the evaluation controller.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Backend name (e.g., "openai")
    fn name(&self) -> &str;

    /// Send a completion request
    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse>;
}
