//! Health check handlers

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Key read by the readiness probe; its absence is a successful read
const READINESS_KEY: &str = "rolegate:readiness";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub checks: ReadyChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadyChecks {
    pub role_store: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    pub latency_ms: u64,
}

/// GET /health - Liveness probe (fast, no dependencies)
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "portal",
    })
}

/// GET /ready - Readiness probe (checks the role store answers)
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, StatusCode> {
    let start = Instant::now();
    let result = state.resolver.store().get_setting(READINESS_KEY).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => Ok(Json(ReadyResponse {
            status: "ready",
            service: "portal",
            checks: ReadyChecks {
                role_store: CheckResult {
                    status: "ok",
                    latency_ms,
                },
            },
        })),
        Err(e) => {
            tracing::warn!(error = %e, latency_ms, "Role store readiness check failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
