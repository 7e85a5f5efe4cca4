//! HTTP clients for the supported completion APIs.
//!
//! `AnthropicClient` talks to the Messages API. `OpenAiCompatibleClient`
//! talks to any Chat Completions endpoint, which covers both OpenAI and a
//! local Ollama server.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::{CompletionRequest, LlmClient};

const ANTHROPIC_DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ERROR_BODY_PREVIEW_CHARS: usize = 300;

pub struct AnthropicClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl AnthropicClient {
    pub fn new(
        http: Client,
        base_url: Option<String>,
        api_key: SecretString,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.unwrap_or_else(|| ANTHROPIC_DEFAULT_BASE_URL.to_string()),
            api_key,
            model: model.into(),
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [MessagesTurn<'a>; 1],
}

#[derive(Serialize)]
struct MessagesTurn<'a> {
    role: &'static str,
    content: [TextBlock<'a>; 1],
}

#[derive(Serialize)]
struct TextBlock<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
            system: &request.system,
            messages: [MessagesTurn {
                role: "user",
                content: [TextBlock { kind: "text", text: &request.user }],
            }],
        };

        let response = self
            .http
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .context("anthropic request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("anthropic returned {status}: {}", preview(&detail));
        }

        let payload: MessagesResponse =
            response.json().await.context("anthropic response was not valid JSON")?;
        debug!(model = %self.model, blocks = payload.content.len(), "anthropic completion received");

        payload
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| anyhow!("anthropic response contained no text block"))
    }
}

pub struct OpenAiCompatibleClient {
    http: Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl OpenAiCompatibleClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        model: impl Into<String>,
    ) -> Self {
        Self { http, base_url: base_url.into(), api_key, model: model.into() }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
            messages: [
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.user },
            ],
        };

        let mut builder = self.http.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder.send().await.context("chat completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("chat completion returned {status}: {}", preview(&detail));
        }

        let payload: ChatResponse =
            response.json().await.context("chat completion response was not valid JSON")?;
        debug!(model = %self.model, choices = payload.choices.len(), "chat completion received");

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("chat completion contained no message content"))
    }
}

fn preview(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use reqwest::Client;
    use serde_json::{json, Value};

    use super::{AnthropicClient, OpenAiCompatibleClient};
    use crate::llm::{CompletionRequest, LlmClient};

    type Seen = Arc<Mutex<Option<(HeaderMap, Value)>>>;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
        let address = listener.local_addr().expect("mock address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{address}")
    }

    fn recording_route(path: &str, seen: Seen, reply: Value) -> Router {
        Router::new().route(
            path,
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let seen = seen.clone();
                let reply = reply.clone();
                async move {
                    *seen.lock().expect("seen lock") = Some((headers, body));
                    Json(reply)
                }
            }),
        )
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "extract items".to_string(),
            user: "2 kg tomato".to_string(),
            temperature: 0.0,
            max_output_tokens: 2000,
        }
    }

    #[tokio::test]
    async fn anthropic_client_sends_messages_request_and_reads_text_block() {
        let seen: Seen = Arc::default();
        let base_url = serve(recording_route(
            "/v1/messages",
            seen.clone(),
            json!({"content": [{"type": "text", "text": "[]"}]}),
        ))
        .await;

        let client = AnthropicClient::new(
            Client::new(),
            Some(base_url),
            "sk-ant-test".to_string().into(),
            "claude-test",
        );
        let reply = client.complete(&request()).await.expect("completion should succeed");
        assert_eq!(reply, "[]");

        let (headers, body) = seen.lock().expect("seen lock").take().expect("request recorded");
        assert_eq!(headers.get("x-api-key").and_then(|v| v.to_str().ok()), Some("sk-ant-test"));
        assert!(headers.contains_key("anthropic-version"));
        assert_eq!(body["model"], "claude-test");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["system"], "extract items");
        assert_eq!(body["messages"][0]["content"][0]["text"], "2 kg tomato");
    }

    #[tokio::test]
    async fn anthropic_error_status_is_reported_without_api_key() {
        let router = Router::new()
            .route("/v1/messages", post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }));
        let base_url = serve(router).await;

        let client = AnthropicClient::new(
            Client::new(),
            Some(base_url),
            "sk-ant-secret".to_string().into(),
            "claude-test",
        );
        let error = client.complete(&request()).await.expect_err("401 should fail");
        let message = format!("{error:#}");

        assert!(message.contains("401"));
        assert!(!message.contains("sk-ant-secret"));
    }

    #[tokio::test]
    async fn chat_client_sends_system_and_user_messages() {
        let seen: Seen = Arc::default();
        let base_url = serve(recording_route(
            "/v1/chat/completions",
            seen.clone(),
            json!({"choices": [{"message": {"role": "assistant", "content": "[{\"item_name\":\"Salt\"}]"}}]}),
        ))
        .await;

        let client = OpenAiCompatibleClient::new(
            Client::new(),
            base_url,
            Some("sk-openai".to_string().into()),
            "gpt-test",
        );
        let reply = client.complete(&request()).await.expect("completion should succeed");
        assert_eq!(reply, "[{\"item_name\":\"Salt\"}]");

        let (headers, body) = seen.lock().expect("seen lock").take().expect("request recorded");
        assert_eq!(
            headers.get("authorization").and_then(|v| v.to_str().ok()),
            Some("Bearer sk-openai")
        );
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "2 kg tomato");
    }
}
