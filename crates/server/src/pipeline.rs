//! Order pipeline: extract → paginate → render → convert → deliver.
//!
//! One `OrderPipeline` is built at startup and shared by every business
//! line. A run owns its order and touches no state outside its own stack.

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::Utc;
use orderslip_agent::ItemExtractor;
use orderslip_core::config::BusinessLineConfig;
use orderslip_core::{paginate, OrderRequest};
use orderslip_telegram::{DeliveryError, DocumentSender, OutboundDocument};
use secrecy::SecretString;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::convert::{ConversionError, DocumentConverter};
use crate::render::{ReceiptRenderer, RenderError};

/// A configured bot, its receipt template and its webhook route.
#[derive(Clone, Debug)]
pub struct BusinessLine {
    pub name: String,
    pub route: String,
    pub bot_token: SecretString,
    pub template: String,
}

impl From<&BusinessLineConfig> for BusinessLine {
    fn from(config: &BusinessLineConfig) -> Self {
        Self {
            name: config.name.clone(),
            route: config.route.clone(),
            bot_token: config.bot_token.clone(),
            template: config.template.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Render(_) => "render",
            Self::Conversion(_) => "convert",
            Self::Delivery(_) => "deliver",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReport {
    pub item_count: usize,
    pub page_count: usize,
    pub document_bytes: usize,
    pub message_id: Option<i64>,
}

pub struct OrderPipeline {
    extractor: Arc<dyn ItemExtractor>,
    renderer: Arc<ReceiptRenderer>,
    converter: Arc<dyn DocumentConverter>,
    sender: Arc<dyn DocumentSender>,
    page_size: NonZeroUsize,
    document_filename: String,
}

impl OrderPipeline {
    pub fn new(
        extractor: Arc<dyn ItemExtractor>,
        renderer: Arc<ReceiptRenderer>,
        converter: Arc<dyn DocumentConverter>,
        sender: Arc<dyn DocumentSender>,
        page_size: NonZeroUsize,
        document_filename: impl Into<String>,
    ) -> Self {
        Self {
            extractor,
            renderer,
            converter,
            sender,
            page_size,
            document_filename: document_filename.into(),
        }
    }

    /// Runs one order under a fresh correlation id and logs the outcome.
    pub async fn process(
        &self,
        line: &BusinessLine,
        order: OrderRequest,
    ) -> Result<DeliveryReport, PipelineError> {
        let correlation_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "order",
            correlation_id = %correlation_id,
            business_line = %line.name,
            chat_id = %order.conversation_id,
        );

        async move {
            let result = self.run(line, order).await;
            match &result {
                Ok(report) => info!(
                    event_name = "pipeline.order.delivered",
                    message_id = ?report.message_id,
                    item_count = report.item_count,
                    page_count = report.page_count,
                    document_bytes = report.document_bytes,
                    "receipt delivered"
                ),
                Err(failure) => error!(
                    event_name = "pipeline.order.failed",
                    stage = failure.stage(),
                    error = %failure,
                    "order pipeline failed; requester will not receive a receipt"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    pub async fn run(
        &self,
        line: &BusinessLine,
        order: OrderRequest,
    ) -> Result<DeliveryReport, PipelineError> {
        let items = self.extractor.extract(&order.raw_text).await;
        let pages = paginate(&items, self.page_size);
        info!(
            event_name = "pipeline.order.paginated",
            item_count = items.len(),
            page_count = pages.len(),
            "order paginated"
        );

        let markup = self.renderer.render(&pages, Utc::now(), &line.template)?;
        let document = self.converter.convert(&markup).await?;
        let document_bytes = document.len();

        let sent = self
            .sender
            .send_document(
                &line.bot_token,
                &order.conversation_id,
                OutboundDocument::pdf(self.document_filename.clone(), document),
            )
            .await?;

        Ok(DeliveryReport {
            item_count: items.len(),
            page_count: pages.len(),
            document_bytes,
            message_id: sent.message_id,
        })
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use orderslip_core::{ConversationId, OrderRequest};

    use super::test_support::{line, pipeline, RecordingConverter};
    use super::PipelineError;
    use crate::render::PAGE_BREAK;

    fn order(text: &str) -> OrderRequest {
        OrderRequest { conversation_id: ConversationId("42".to_string()), raw_text: text.to_string() }
    }

    #[tokio::test]
    async fn two_item_order_becomes_one_page_receipt() {
        let converter = Arc::new(RecordingConverter::default());
        let (pipeline, mut delivered) = pipeline(
            Ok(r#"[{"item_name":"Tomato","quantity":"2 kg"},{"item_name":"Banana","quantity":"1 dozen"}]"#),
            converter.clone(),
        );
        let line = line("anil_kiryana", "/anilkiryanawebhook", "anil_kiryana", "200:anil");

        let report = pipeline
            .process(&line, order("2 kg tomato, 1 dozen banana"))
            .await
            .expect("pipeline should deliver");

        assert_eq!(report.item_count, 2);
        assert_eq!(report.page_count, 1);
        assert_eq!(report.document_bytes, b"%PDF-stub".len());

        let markups = converter.markups.lock().expect("markup lock").clone();
        assert_eq!(markups.len(), 1);
        let markup = &markups[0];
        assert!(markup.contains("Tomato") && markup.contains("Banana"));
        assert!(markup.contains(r#"<td class="serial">1</td>"#));
        assert!(markup.contains(r#"<td class="serial">2</td>"#));
        assert!(!markup.contains(r#"<td class="serial">3</td>"#));
        assert_eq!(markup.matches(PAGE_BREAK).count(), 0);

        let sent = delivered.recv().await.expect("document delivered");
        assert_eq!(sent.token, "200:anil");
        assert_eq!(sent.chat, ConversationId("42".to_string()));
        assert_eq!(sent.document.file_name, "receipt.pdf");
        assert_eq!(sent.document.bytes, b"%PDF-stub");
    }

    #[tokio::test]
    async fn empty_extraction_still_delivers_empty_receipt() {
        let converter = Arc::new(RecordingConverter::default());
        let (pipeline, mut delivered) = pipeline(Ok("[]"), converter.clone());
        let line = line("default", "/webhook", "rs_vegetables", "100:default");

        let report = pipeline.process(&line, order("hello")).await.expect("pipeline runs");

        assert_eq!(report.item_count, 0);
        assert_eq!(report.page_count, 0);
        let markups = converter.markups.lock().expect("markup lock").clone();
        assert!(markups[0].contains("No items could be read from this order."));
        assert!(delivered.recv().await.is_some());
    }

    #[tokio::test]
    async fn model_failure_degrades_to_empty_receipt() {
        let converter = Arc::new(RecordingConverter::default());
        let (pipeline, _delivered) = pipeline(Err("model overloaded"), converter.clone());
        let line = line("default", "/webhook", "rs_vegetables", "100:default");

        let report = pipeline.process(&line, order("2 kg onion")).await.expect("pipeline runs");
        assert_eq!(report.item_count, 0);
    }

    #[tokio::test]
    async fn conversion_failure_stops_before_delivery() {
        let converter = Arc::new(RecordingConverter { fail: true, ..RecordingConverter::default() });
        let (pipeline, mut delivered) = pipeline(Ok("[]"), converter);
        let line = line("default", "/webhook", "rs_vegetables", "100:default");

        let error = pipeline.process(&line, order("x")).await.expect_err("conversion fails");

        assert!(matches!(error, PipelineError::Conversion(_)));
        assert_eq!(error.stage(), "convert");
        drop(pipeline);
        assert!(delivered.recv().await.is_none());
    }

    #[tokio::test]
    async fn unknown_template_is_a_render_failure() {
        let converter = Arc::new(RecordingConverter::default());
        let (pipeline, _delivered) = pipeline(Ok("[]"), converter.clone());
        let line = line("default", "/webhook", "missing", "100:default");

        let error = pipeline.process(&line, order("x")).await.expect_err("render fails");

        assert!(matches!(error, PipelineError::Render(_)));
        assert!(converter.markups.lock().expect("markup lock").is_empty());
    }
}
