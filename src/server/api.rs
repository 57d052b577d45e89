use axum::{Json, Router, extract::State, routing::get};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::SharedState;

pub const APPLICATION_NAME: &str = "EcosystIA";

// ── Response payload types ────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    /// Seconds since the server state was created.
    pub uptime: f64,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub application: String,
    pub environment: String,
    pub port: u16,
    pub domain: String,
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/status", get(status))
}

// ── Handlers ──────────────────────────────────────────────────────────

/// Liveness probe. Never touches the backend, so it answers 200 for as long
/// as the process runs.
async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: state.started_at.elapsed().as_secs_f64(),
        version: state.config.version.clone(),
    })
}

async fn status(State(state): State<SharedState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        application: APPLICATION_NAME.to_string(),
        environment: state.config.environment.to_string(),
        port: state.config.port,
        domain: state.config.domain.clone(),
    })
}
