use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::worker::WorkerPool;

#[derive(Clone)]
pub struct HealthState {
    pool: WorkerPool,
    business_lines: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkerCheck {
    pub status: &'static str,
    pub capacity: usize,
    pub in_flight: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub workers: WorkerCheck,
    pub business_lines: Vec<String>,
    pub checked_at: String,
}

pub fn router(pool: WorkerPool, business_lines: Vec<String>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { pool, business_lines })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let workers = worker_check(&state.pool);
    let ready = workers.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "orderslip-server runtime initialized".to_string(),
        },
        workers,
        business_lines: state.business_lines,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn worker_check(pool: &WorkerPool) -> WorkerCheck {
    WorkerCheck {
        status: if pool.is_closed() { "closed" } else { "ready" },
        capacity: pool.capacity(),
        in_flight: if pool.is_closed() { 0 } else { pool.in_flight() },
    }
}
