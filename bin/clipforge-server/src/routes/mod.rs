//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - middleware layers (CORS, per-request trace id)
//! - optional Swagger UI / OpenAPI document (disable with `CLIPFORGE_ENABLE_SWAGGER=false`)
//! - service info and ping at the root
//! - the task API under `/api/v1`, with generation routes behind the API key check

pub mod doc;
mod download;
mod generate;
mod health;
mod tasks;

use std::sync::Arc;

use axum::{Router, middleware};
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(health::router())
        .merge(generate::router(state.clone()))
        .merge(tasks::router())
        .merge(download::router());

    let mut app = Router::new()
        .merge(health::root_router())
        .nest("/api/v1", api_router);

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app.layer(cors::cors_layer(&state))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_util {
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    pub fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }
}
