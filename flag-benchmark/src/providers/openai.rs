//! OpenAI-compatible chat completions client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::traits::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, ProviderError, ProviderResult,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Client for any backend speaking the `/chat/completions` protocol
pub struct OpenAIClient {
    api_key: String,
    base_url: String,
    http_client: Client,
}

impl OpenAIClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http_client: Client::new(),
        }
    }

    /// Create from the default `OPENAI_API_KEY` environment variable
    pub fn from_env() -> ProviderResult<Self> {
        Self::from_env_var(DEFAULT_API_KEY_ENV)
    }

    /// Create from a named environment variable holding the API key
    pub fn from_env_var(var: &str) -> ProviderResult<Self> {
        let api_key = std::env::var(var)
            .map_err(|_| ProviderError::Config(format!("{} not set", var)))?;
        Ok(Self::new(api_key))
    }

    /// Set custom base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    total_tokens: Option<u64>,
}

#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

/// Parse a successful `/chat/completions` body.
///
/// Missing choices, content or usage totals are protocol errors: the token
/// count must be what the backend billed, never an estimate.
pub fn parse_completion_body(
    body: &str,
    requested_model: &str,
    latency_ms: u64,
) -> ProviderResult<CompletionResponse> {
    let api_response: OpenAIResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("Malformed response body: {}", e)))?;

    let usage = api_response
        .usage
        .ok_or_else(|| ProviderError::Parse("No usage in response".to_string()))?;
    let total_tokens = usage
        .total_tokens
        .ok_or_else(|| ProviderError::Parse("No total_tokens in usage".to_string()))?;

    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))?;

    let content = choice
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| ProviderError::Parse("No message content in first choice".to_string()))?;

    Ok(CompletionResponse {
        content: content.trim().to_string(),
        model: api_response
            .model
            .unwrap_or_else(|| requested_model.to_string()),
        total_tokens,
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        finish_reason: choice.finish_reason.unwrap_or_else(|| "unknown".to_string()),
        latency_ms,
    })
}

#[async_trait]
impl LLMProvider for OpenAIClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        let start = Instant::now();

        let body = OpenAIRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<OpenAIError>(&text) {
                Ok(error) => error.error.message,
                Err(_) => format!("HTTP {}: {}", status.as_u16(), text),
            };
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        parse_completion_body(&text, &request.model, latency_ms)
    }
}
