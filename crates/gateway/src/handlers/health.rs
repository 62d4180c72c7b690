//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub service: String,
    pub version: &'static str,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub provider: ProviderCheck,
}

#[derive(Serialize)]
pub struct ProviderCheck {
    pub name: String,
    pub base_url: String,
    pub authenticated: bool,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Readiness probe - reports the configured citation provider.
///
/// The upstream API is not pinged: its quota is too small to spend on probes.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        status: "ready".to_string(),
        service: state.config.observability.service_name.clone(),
        version: citeforge_common::VERSION,
        checks: HealthChecks {
            provider: ProviderCheck {
                name: state.provider_name.clone(),
                base_url: state.config.provider.base_url.clone(),
                authenticated: state.config.provider.api_key.is_some(),
            },
        },
    })
}
