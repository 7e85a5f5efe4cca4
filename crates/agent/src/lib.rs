//! Order extraction - turns free-text chat orders into line items
//!
//! - **LLM seam** (`llm`) - `LlmClient` trait and provider selection
//! - **Providers** (`providers`) - Anthropic Messages and OpenAI-compatible
//!   Chat Completions clients
//! - **Extraction** (`extraction`) - `ItemExtractor` and reply parsing
//! - **Prompt** (`prompt`) - system instruction loading
//!
//! Extraction never fails the pipeline: transport and parse errors are
//! logged and produce an empty order.

pub mod extraction;
pub mod llm;
pub mod prompt;
pub mod providers;

pub use extraction::{parse_items, ExtractionError, ItemExtractor, LlmItemExtractor};
pub use llm::{client_from_config, CompletionRequest, LlmClient};
