use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("rendering service request failed: {0}")]
    Transport(String),
    #[error("rendering service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("rendering service returned an empty document")]
    EmptyDocument,
}

/// Converts receipt markup into the downloadable file.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, markup: &str) -> Result<Vec<u8>, ConversionError>;
}

/// Posts `{"html": ...}` to an external HTML-to-PDF endpoint and returns the
/// response body as the document.
#[derive(Clone, Debug)]
pub struct HttpDocumentConverter {
    http: Client,
    url: String,
}

#[derive(Serialize)]
struct ConvertRequest<'a> {
    html: &'a str,
}

impl HttpDocumentConverter {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, ConversionError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ConversionError::Transport(error.to_string()))?;
        Ok(Self::new(http, url))
    }
}

#[async_trait]
impl DocumentConverter for HttpDocumentConverter {
    async fn convert(&self, markup: &str) -> Result<Vec<u8>, ConversionError> {
        let response = self
            .http
            .post(&self.url)
            .json(&ConvertRequest { html: markup })
            .send()
            .await
            // The endpoint URL may carry a service key in its query string.
            .map_err(|error| ConversionError::Transport(error.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "rendering service rejected markup");
            return Err(ConversionError::Status {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| ConversionError::Transport(error.without_url().to_string()))?;
        if bytes.is_empty() {
            return Err(ConversionError::EmptyDocument);
        }

        info!(markup_bytes = markup.len(), document_bytes = bytes.len(), "markup converted");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;

    use super::{ConversionError, DocumentConverter, HttpDocumentConverter};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
        let address = listener.local_addr().expect("mock address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{address}")
    }

    #[tokio::test]
    async fn posts_html_json_and_returns_raw_body() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let recorder = seen.clone();
        let router = Router::new().route(
            "/pdf",
            post(move |Json(body): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    *recorder.lock().expect("seen lock") = Some(body);
                    b"%PDF-1.7 fake".to_vec()
                }
            }),
        );
        let base_url = serve(router).await;

        let converter = HttpDocumentConverter::new(reqwest::Client::new(), format!("{base_url}/pdf"));
        let document = converter.convert("<p>receipt</p>").await.expect("convert succeeds");

        assert_eq!(document, b"%PDF-1.7 fake");
        let body = seen.lock().expect("seen lock").take().expect("request recorded");
        assert_eq!(body["html"], "<p>receipt</p>");
    }

    #[tokio::test]
    async fn error_status_is_a_conversion_error() {
        let router = Router::new()
            .route("/pdf", post(|| async { (StatusCode::BAD_GATEWAY, "renderer crashed") }));
        let base_url = serve(router).await;

        let converter = HttpDocumentConverter::new(reqwest::Client::new(), format!("{base_url}/pdf"));
        let error = converter.convert("<p/>").await.expect_err("502 should fail");

        assert!(matches!(
            error,
            ConversionError::Status { status: 502, ref body } if body == "renderer crashed"
        ));
    }

    #[tokio::test]
    async fn empty_body_is_a_conversion_error() {
        let router = Router::new().route("/pdf", post(|| async { StatusCode::OK }));
        let base_url = serve(router).await;

        let converter = HttpDocumentConverter::new(reqwest::Client::new(), format!("{base_url}/pdf"));
        assert!(matches!(
            converter.convert("<p/>").await,
            Err(ConversionError::EmptyDocument)
        ));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_conversion_error() {
        let converter = HttpDocumentConverter::new(reqwest::Client::new(), "http://127.0.0.1:9/pdf");
        assert!(matches!(
            converter.convert("<p/>").await,
            Err(ConversionError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_the_service_key() {
        let converter = HttpDocumentConverter::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/pdf?api_key=pdf-secret-key",
        );

        let error = converter.convert("<p/>").await.expect_err("connection should be refused");

        assert!(matches!(error, ConversionError::Transport(_)));
        assert!(!error.to_string().contains("pdf-secret-key"));
    }
}
