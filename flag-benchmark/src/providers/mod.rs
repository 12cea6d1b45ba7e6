//! Completion backend clients

pub mod openai;
pub mod traits;

pub use openai::OpenAIClient;
pub use traits::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, ProviderError, ProviderResult,
};

use crate::config::BackendConfig;
use std::sync::Arc;

/// Sampling temperature used for every evaluation request
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Create the configured backend, reading its API key from the environment
pub fn create_provider(config: &BackendConfig) -> ProviderResult<Arc<dyn LLMProvider>> {
    let client = OpenAIClient::from_env_var(&config.api_key_env)?.with_base_url(&config.base_url);
    tracing::debug!("Using backend at {}", client.base_url());
    Ok(Arc::new(client))
}
