//! Inbound webhook routes, one per business line.
//!
//! Every route acknowledges a well-formed update immediately and hands the
//! order to the worker pool; the receipt arrives in the chat later.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use orderslip_core::{ApplicationError, InterfaceError};
use orderslip_telegram::parse_order;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pipeline::{BusinessLine, OrderPipeline};
use crate::worker::WorkerPool;

#[derive(Clone)]
pub struct WebhookState {
    pipeline: Arc<OrderPipeline>,
    pool: WorkerPool,
    line: Arc<BusinessLine>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
    correlation_id: &'a str,
}

pub struct WebhookRejection(InterfaceError);

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let kind = match &self.0 {
            InterfaceError::BadRequest { .. } => "bad_request",
            InterfaceError::ServiceUnavailable { .. } => "service_unavailable",
            InterfaceError::Internal { .. } => "internal",
        };
        let body = ErrorBody {
            error: kind,
            message: self.0.user_message(),
            correlation_id: self.0.correlation_id(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(
    pipeline: Arc<OrderPipeline>,
    pool: WorkerPool,
    lines: &[BusinessLine],
) -> Router {
    lines.iter().fold(Router::new(), |router, line| {
        let state = WebhookState {
            pipeline: pipeline.clone(),
            pool: pool.clone(),
            line: Arc::new(line.clone()),
        };
        router.merge(Router::new().route(&line.route, post(receive_update)).with_state(state))
    })
}

pub async fn receive_update(
    State(state): State<WebhookState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, WebhookRejection> {
    let order = match parse_order(&body) {
        Ok(order) => order,
        Err(error) => {
            let correlation_id = Uuid::new_v4().to_string();
            warn!(
                event_name = "webhook.update.malformed",
                correlation_id = %correlation_id,
                business_line = %state.line.name,
                error = %error,
                "rejecting malformed update"
            );
            return Err(WebhookRejection(
                ApplicationError::MalformedPayload(error.to_string()).into_interface(correlation_id),
            ));
        }
    };

    if state.pool.is_closed() {
        let correlation_id = Uuid::new_v4().to_string();
        warn!(
            event_name = "webhook.update.refused",
            correlation_id = %correlation_id,
            business_line = %state.line.name,
            "worker pool closed; refusing update"
        );
        return Err(WebhookRejection(
            ApplicationError::Integration("shutting down".to_string())
                .into_interface(correlation_id),
        ));
    }

    info!(
        event_name = "webhook.update.accepted",
        business_line = %state.line.name,
        chat_id = %order.conversation_id,
        text_chars = order.raw_text.chars().count(),
        in_flight = state.pool.in_flight(),
        "order accepted"
    );

    let WebhookState { pipeline, pool, line } = state;
    // Pipeline failures are logged inside `process`.
    pool.submit_detached(async move {
        let _ = pipeline.process(&line, order).await;
    });

    Ok(Json(json!({ "ok": true })))
}
