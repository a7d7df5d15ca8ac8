//! HTTP handlers for the gateway server

use std::sync::Arc;

use axum::extract::FromRef;
use axum::response::Json;
use serde::Serialize;
use tracing::debug;

use super::ServiceContainer;

/// Router state
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<ServiceContainer>,
}

impl FromRef<AppState> for Arc<ServiceContainer> {
    fn from_ref(state: &AppState) -> Self {
        state.services.clone()
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    debug!("[Gateway] Health check");
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
