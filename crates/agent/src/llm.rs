use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use orderslip_core::config::{LlmConfig, LlmProvider};

use crate::providers::{AnthropicClient, OpenAiCompatibleClient};

/// A single-turn completion: one system instruction, one user message.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Builds the client for the configured provider.
pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Anthropic => Arc::new(AnthropicClient::new(
            http,
            config.base_url.clone(),
            config.api_key.clone().unwrap_or_else(|| String::new().into()),
            config.model.clone(),
        )),
        LlmProvider::OpenAi => Arc::new(OpenAiCompatibleClient::new(
            http,
            config.base_url.clone().unwrap_or_else(|| "https://api.openai.com".to_string()),
            config.api_key.clone(),
            config.model.clone(),
        )),
        LlmProvider::Ollama => Arc::new(OpenAiCompatibleClient::new(
            http,
            config.base_url.clone().unwrap_or_else(|| "http://localhost:11434".to_string()),
            config.api_key.clone(),
            config.model.clone(),
        )),
    };

    Ok(client)
}
