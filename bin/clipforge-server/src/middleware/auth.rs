use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::ServerError;
use crate::state::AppState;

pub static X_API_KEY: &str = "x-api-key";

/// Reject the request unless it carries the configured API key.
///
/// A no-op when authentication is disabled.  With authentication enabled and
/// no key configured, every request is rejected.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.enable_auth {
        return next.run(req).await;
    }

    let provided = req.headers().get(X_API_KEY).and_then(|v| v.to_str().ok());
    let authorized = matches!(
        (state.config.api_key.as_deref(), provided),
        (Some(expected), Some(token)) if token == expected
    );
    if !authorized {
        warn!(path = %req.uri().path(), "rejected request without a valid API key");
        return ServerError::Unauthorized("invalid or missing API key".into()).into_response();
    }
    next.run(req).await
}
