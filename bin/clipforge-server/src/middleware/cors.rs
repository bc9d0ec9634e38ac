use std::sync::Arc;

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

pub fn cors_layer(state: &Arc<AppState>) -> CorsLayer {
    let base = CorsLayer::new().allow_headers(Any).allow_methods(Any);

    let origins: Vec<HeaderValue> = state
        .config
        .cors_allowed_origins
        .as_deref()
        .map(|list| {
            list.split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect()
        })
        .unwrap_or_default();

    if origins.is_empty() {
        // Wildcard; set CLIPFORGE_CORS_ORIGINS in production.
        base.allow_origin(Any)
    } else {
        base.allow_origin(origins)
    }
}
