use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use orderslip_agent::prompt::{load_system_prompt, PromptError};
use orderslip_agent::{client_from_config, LlmItemExtractor};
use orderslip_core::config::{AppConfig, ConfigError};
use orderslip_core::DomainError;
use orderslip_telegram::{BotApiClient, DeliveryError};
use thiserror::Error;
use tracing::{info, warn};

use crate::convert::{ConversionError, HttpDocumentConverter};
use crate::pipeline::{BusinessLine, OrderPipeline};
use crate::render::{ReceiptRenderer, RenderError};
use crate::worker::WorkerPool;
use crate::{health, webhook};

pub struct Application {
    pub config: AppConfig,
    pub pipeline: Arc<OrderPipeline>,
    pub pool: WorkerPool,
    pub business_lines: Vec<BusinessLine>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("receipt templates failed to load: {0}")]
    Templates(#[source] RenderError),
    #[error("business line `{line}` uses unknown template `{template}`")]
    UnknownTemplate { line: String, template: String },
    #[error("llm client setup failed: {0}")]
    LlmClient(#[source] anyhow::Error),
    #[error("rendering service client setup failed: {0}")]
    Converter(#[source] ConversionError),
    #[error("bot api client setup failed: {0}")]
    BotApi(#[source] DeliveryError),
    #[error("renderer.rows_per_page is invalid: {0}")]
    PageSize(#[source] DomainError),
}

impl Application {
    /// Webhook routes for every business line plus `/health`.
    pub fn router(&self) -> Router {
        let names = self.business_lines.iter().map(|line| line.name.clone()).collect();
        webhook::router(self.pipeline.clone(), self.pool.clone(), &self.business_lines)
            .merge(health::router(self.pool.clone(), names))
    }
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;

    let system_prompt = load_system_prompt(&config.llm.system_prompt_path)?;
    let llm = client_from_config(&config.llm).map_err(BootstrapError::LlmClient)?;
    info!(
        event_name = "system.bootstrap.llm_ready",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        "llm client configured"
    );

    let renderer = load_renderer(&config)?;
    let business_lines: Vec<BusinessLine> =
        config.business_lines.iter().map(BusinessLine::from).collect();
    for line in &business_lines {
        if !renderer.has_template(&line.template) {
            return Err(BootstrapError::UnknownTemplate {
                line: line.name.clone(),
                template: line.template.clone(),
            });
        }
    }

    let converter = HttpDocumentConverter::with_timeout(
        config.converter.url.clone(),
        Duration::from_secs(config.converter.timeout_secs),
    )
    .map_err(BootstrapError::Converter)?;
    let sender = BotApiClient::with_timeout(
        config.telegram.api_base_url.clone(),
        Duration::from_secs(config.telegram.timeout_secs),
    )
    .map_err(BootstrapError::BotApi)?;
    let page_size = config.renderer.page_size().map_err(BootstrapError::PageSize)?;

    let pipeline = OrderPipeline::new(
        Arc::new(LlmItemExtractor::new(llm, system_prompt, config.llm.max_output_tokens)),
        Arc::new(renderer),
        Arc::new(converter),
        Arc::new(sender),
        page_size,
        config.telegram.document_filename.clone(),
    );
    let pool = WorkerPool::new(config.pipeline.max_concurrent_orders);

    for line in &business_lines {
        info!(
            event_name = "system.bootstrap.business_line",
            correlation_id = "bootstrap",
            business_line = %line.name,
            route = %line.route,
            template = %line.template,
            "business line registered"
        );
    }

    Ok(Application { config, pipeline: Arc::new(pipeline), pool, business_lines })
}

fn load_renderer(config: &AppConfig) -> Result<ReceiptRenderer, BootstrapError> {
    let template_dir = &config.renderer.template_dir;
    if template_dir.is_dir() {
        return ReceiptRenderer::from_dir(template_dir).map_err(BootstrapError::Templates);
    }

    warn!(
        event_name = "system.bootstrap.templates_embedded",
        correlation_id = "bootstrap",
        template_dir = %template_dir.display(),
        "template directory not found; using bundled receipt templates"
    );
    ReceiptRenderer::with_embedded_templates().map_err(BootstrapError::Templates)
}
