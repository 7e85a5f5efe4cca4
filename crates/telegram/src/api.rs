use std::time::Duration;

use async_trait::async_trait;
use orderslip_core::ConversationId;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("bot api request failed: {0}")]
    Transport(String),
    #[error("bot api returned HTTP {status}: {description}")]
    Status { status: u16, description: String },
    #[error("bot api rejected the document: {0}")]
    Rejected(String),
    #[error("invalid document part: {0}")]
    InvalidDocument(String),
}

/// A file ready to be uploaded to a chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundDocument {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl OutboundDocument {
    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), mime_type: "application/pdf".to_string(), bytes }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentDocument {
    pub message_id: Option<i64>,
}

#[async_trait]
pub trait DocumentSender: Send + Sync {
    async fn send_document(
        &self,
        bot_token: &SecretString,
        chat: &ConversationId,
        document: OutboundDocument,
    ) -> Result<SentDocument, DeliveryError>;
}

/// Bot API client shared by every business line; the bot token is chosen
/// per call.
#[derive(Clone, Debug)]
pub struct BotApiClient {
    http: Client,
    api_base_url: String,
}

#[derive(Deserialize)]
struct ApiReply {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<ApiMessage>,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message_id: Option<i64>,
}

impl BotApiClient {
    pub fn new(http: Client, api_base_url: impl Into<String>) -> Self {
        Self { http, api_base_url: api_base_url.into() }
    }

    pub fn with_timeout(
        api_base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| DeliveryError::Transport(error.to_string()))?;
        Ok(Self::new(http, api_base_url))
    }

    fn method_url(&self, bot_token: &SecretString, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base_url.trim_end_matches('/'),
            bot_token.expose_secret()
        )
    }
}

#[async_trait]
impl DocumentSender for BotApiClient {
    async fn send_document(
        &self,
        bot_token: &SecretString,
        chat: &ConversationId,
        document: OutboundDocument,
    ) -> Result<SentDocument, DeliveryError> {
        let size = document.bytes.len();
        let part = Part::bytes(document.bytes)
            .file_name(document.file_name.clone())
            .mime_str(&document.mime_type)
            .map_err(|error| DeliveryError::InvalidDocument(error.to_string()))?;
        let form = Form::new().text("chat_id", chat.0.clone()).part("document", part);

        debug!(chat_id = %chat, file_name = %document.file_name, size, "uploading document");

        // Errors carry the request URL, which embeds the bot token.
        let response = self
            .http
            .post(self.method_url(bot_token, "sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|error| DeliveryError::Transport(error.without_url().to_string()))?;

        let status = response.status();
        let reply = response.json::<ApiReply>().await.ok();

        if !status.is_success() {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                description: reply
                    .and_then(|reply| reply.description)
                    .unwrap_or_else(|| status.to_string()),
            });
        }

        match reply {
            Some(reply) if reply.ok => {
                let message_id = reply.result.and_then(|message| message.message_id);
                info!(chat_id = %chat, size, ?message_id, "document delivered");
                Ok(SentDocument { message_id })
            }
            Some(reply) => Err(DeliveryError::Rejected(
                reply.description.unwrap_or_else(|| "ok=false without description".to_string()),
            )),
            None => {
                Err(DeliveryError::Rejected("reply body was not a bot api response".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{body::Bytes, http::StatusCode, http::Uri, Json, Router};
    use orderslip_core::ConversationId;
    use secrecy::SecretString;
    use serde_json::{json, Value};

    use super::{BotApiClient, DeliveryError, DocumentSender, OutboundDocument};

    type Seen = Arc<Mutex<Option<(String, Vec<u8>)>>>;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
        let address = listener.local_addr().expect("mock address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{address}")
    }

    fn mock_bot_api(seen: Seen, status: StatusCode, reply: Value) -> Router {
        Router::new().fallback(move |uri: Uri, body: Bytes| {
            let seen = seen.clone();
            let reply = reply.clone();
            async move {
                *seen.lock().expect("seen lock") = Some((uri.path().to_string(), body.to_vec()));
                (status, Json(reply))
            }
        })
    }

    fn token() -> SecretString {
        "123:secret-token".to_string().into()
    }

    #[tokio::test]
    async fn uploads_document_as_multipart_to_bot_path() {
        let seen: Seen = Arc::default();
        let base_url = serve(mock_bot_api(
            seen.clone(),
            StatusCode::OK,
            json!({"ok": true, "result": {"message_id": 99}}),
        ))
        .await;
        let client = BotApiClient::new(reqwest::Client::new(), base_url);

        let sent = client
            .send_document(
                &token(),
                &ConversationId("42".to_string()),
                OutboundDocument::pdf("receipt.pdf", b"%PDF-test".to_vec()),
            )
            .await
            .expect("upload should succeed");
        assert_eq!(sent.message_id, Some(99));

        let (path, body) = seen.lock().expect("seen lock").take().expect("request recorded");
        let body = String::from_utf8_lossy(&body);
        assert_eq!(path, "/bot123:secret-token/sendDocument");
        assert!(body.contains("name=\"chat_id\""));
        assert!(body.contains("42"));
        assert!(body.contains("filename=\"receipt.pdf\""));
        assert!(body.contains("%PDF-test"));
    }

    #[tokio::test]
    async fn api_rejection_is_a_delivery_error() {
        let base_url = serve(mock_bot_api(
            Arc::default(),
            StatusCode::BAD_REQUEST,
            json!({"ok": false, "description": "Bad Request: chat not found"}),
        ))
        .await;
        let client = BotApiClient::new(reqwest::Client::new(), base_url);

        let error = client
            .send_document(
                &token(),
                &ConversationId("1".to_string()),
                OutboundDocument::pdf("receipt.pdf", vec![1, 2, 3]),
            )
            .await
            .expect_err("400 should fail");

        assert!(matches!(
            error,
            DeliveryError::Status { status: 400, ref description } if description.contains("chat not found")
        ));
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_the_token() {
        // Nothing listens on port 9 locally.
        let client = BotApiClient::new(reqwest::Client::new(), "http://127.0.0.1:9");

        let error = client
            .send_document(
                &token(),
                &ConversationId("1".to_string()),
                OutboundDocument::pdf("receipt.pdf", vec![1]),
            )
            .await
            .expect_err("connection should be refused");

        assert!(matches!(error, DeliveryError::Transport(_)));
        assert!(!error.to_string().contains("secret-token"));
    }
}
