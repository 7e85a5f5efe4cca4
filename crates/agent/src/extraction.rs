use std::sync::Arc;

use async_trait::async_trait;
use orderslip_core::LineItem;
use thiserror::Error;
use tracing::{info, warn};

use crate::llm::{CompletionRequest, LlmClient};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("completion request failed: {0:#}")]
    Completion(anyhow::Error),
    #[error("model reply is not a JSON item list: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Turns free-text order messages into line items.
#[async_trait]
pub trait ItemExtractor: Send + Sync {
    /// Never fails: any extraction problem is logged and yields no items.
    async fn extract(&self, raw_text: &str) -> Vec<LineItem>;
}

pub struct LlmItemExtractor {
    client: Arc<dyn LlmClient>,
    system_prompt: Arc<str>,
    max_output_tokens: u32,
}

impl LlmItemExtractor {
    pub fn new(
        client: Arc<dyn LlmClient>,
        system_prompt: impl Into<Arc<str>>,
        max_output_tokens: u32,
    ) -> Self {
        Self { client, system_prompt: system_prompt.into(), max_output_tokens }
    }

    pub async fn try_extract(&self, raw_text: &str) -> Result<Vec<LineItem>, ExtractionError> {
        let request = CompletionRequest {
            system: self.system_prompt.to_string(),
            user: raw_text.to_string(),
            temperature: 0.0,
            max_output_tokens: self.max_output_tokens,
        };

        let reply = self.client.complete(&request).await.map_err(ExtractionError::Completion)?;
        parse_items(&reply)
    }
}

#[async_trait]
impl ItemExtractor for LlmItemExtractor {
    async fn extract(&self, raw_text: &str) -> Vec<LineItem> {
        match self.try_extract(raw_text).await {
            Ok(items) => {
                info!(
                    event_name = "pipeline.extract.completed",
                    item_count = items.len(),
                    "extracted line items from order text"
                );
                items
            }
            Err(error) => {
                warn!(
                    event_name = "pipeline.extract.failed",
                    error = %error,
                    "item extraction failed; continuing with an empty order"
                );
                Vec::new()
            }
        }
    }
}

/// Parses a model reply as a JSON array of line items.
///
/// Models sometimes wrap JSON in a Markdown code fence even when told not
/// to, so a single surrounding fence is stripped first.
pub fn parse_items(reply: &str) -> Result<Vec<LineItem>, ExtractionError> {
    Ok(serde_json::from_str(strip_code_fence(reply.trim()))?)
}

fn strip_code_fence(reply: &str) -> &str {
    let Some(rest) = reply.strip_prefix("```") else {
        return reply;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return reply;
    };
    // Drop the info string (`json`) on the opening fence line.
    match body.split_once('\n') {
        Some((_, content)) => content.trim(),
        None => body.trim(),
    }
}
