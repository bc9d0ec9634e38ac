//! Service info, ping and health endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use clipforge_core::Platform;
use serde_json::{Value, json};
use strum::IntoEnumIterator;
use utoipa::OpenApi;

use crate::schemas::health::{HealthResponse, RootResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_root, ping, get_health),
    components(schemas(RootResponse, HealthResponse))
)]
pub struct HealthApi;

/// Routes mounted at the root.
pub fn root_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_root))
        .route("/ping", get(ping))
}

/// Routes nested under `/api/v1`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses((status = 200, description = "Service information", body = RootResponse))
)]
pub async fn get_root() -> Json<RootResponse> {
    Json(RootResponse {
        name: env!("CARGO_PKG_NAME").to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        status: "running".to_owned(),
        docs: "/swagger-ui".to_owned(),
    })
}

#[utoipa::path(
    get,
    path = "/ping",
    tag = "health",
    responses((status = 200, description = "Liveness probe", body = Value))
)]
pub async fn ping() -> Json<Value> {
    Json(json!({ "status": "pong" }))
}

/// Health check for load-balancers and monitoring.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses((status = 200, description = "Server is healthy", body = HealthResponse))
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        device: state.config.device.clone(),
        available_platforms: Platform::iter().map(|p| p.to_string()).collect(),
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────
