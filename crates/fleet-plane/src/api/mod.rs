//! API module for the control plane server

pub mod error;
pub mod handlers;

use axum::{
    extract::State,
    http::{Method, Uri},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use error::ApiError;
use handlers::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub provisioned_devices: usize,
    pub policy_name: String,
    pub firmware: String,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Readiness check endpoint
///
/// GET /ready
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    let count = state.store.count().await;
    if let Err(e) = &count {
        warn!(error = %e, "Credential store not reachable");
    }
    let firmware = state.dispatcher.firmware();

    Json(ReadyResponse {
        ready: count.is_ok(),
        provisioned_devices: count.unwrap_or(0),
        policy_name: state.lifecycle.policy().name().to_string(),
        firmware: format!("{}/{}", firmware.bucket, firmware.key),
    })
}

/// Reject requests to unknown paths
async fn unknown_path(uri: Uri) -> ApiError {
    ApiError::InvalidPath(uri.path().to_string())
}

/// Reject a known path called with the wrong method
async fn wrong_method(method: Method) -> ApiError {
    ApiError::InvalidMethod(method.to_string())
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    // Browser dashboards call the command endpoints cross-origin. The layer
    // answers every OPTIONS request itself, so preflights never reach a handler.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Device identity
        .route("/provisioning", post(handlers::provision))
        .route("/unprovisioning", post(handlers::unprovision))
        // Commands
        .route("/ota", post(handlers::send_ota))
        // Firmware downloads through capability URLs
        .route("/v1/firmware/{bucket}/{key}", get(handlers::download_firmware))
        .method_not_allowed_fallback(wrong_method)
        .fallback(unknown_path)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
