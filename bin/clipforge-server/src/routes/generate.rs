//! Clip generation endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router, middleware};
use chrono::Utc;
use clipforge_core::TaskStatus;
use tracing::{info, warn};
use utoipa::OpenApi;
use validator::Validate;

use crate::error::ServerError;
use crate::middleware::auth::require_api_key;
use crate::schemas::generate::{GenerateRequest, GenerateResponse, WebhookResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(generate, n8n_webhook),
    components(schemas(GenerateRequest, GenerateResponse, WebhookResponse))
)]
pub struct GenerateApi;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(generate))
        .route("/webhook/n8n", post(n8n_webhook))
        .route_layer(middleware::from_fn_with_state(state, require_api_key))
}

/// Create a generation task and return at once.
///
/// Poll `/api/v1/status/{task_id}` for progress and the download URL.
#[utoipa::path(
    post,
    path = "/api/v1/generate",
    tag = "generation",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Task created", body = GenerateResponse),
        (status = 400, description = "Invalid generation parameters"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 422, description = "Field out of bounds"),
    )
)]
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ServerError> {
    Ok(Json(submit(&state, req).await?))
}

/// Same input as `/generate`, shaped for n8n workflows.
///
/// Replies with HTTP 200 either way; `success` carries the outcome.
#[utoipa::path(
    post,
    path = "/api/v1/webhook/n8n",
    tag = "generation",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Outcome of the submission", body = WebhookResponse),
        (status = 401, description = "Missing or invalid API key"),
    )
)]
pub async fn n8n_webhook(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Json<WebhookResponse> {
    let result = match payload {
        Ok(Json(req)) => submit(&state, req).await,
        Err(rejection) => Err(ServerError::BadRequest(rejection.body_text())),
    };
    match result {
        Ok(created) => Json(WebhookResponse::accepted(created)),
        Err(err) => {
            let (_, message) = err.status_and_message();
            warn!(error = %message, "n8n webhook submission rejected");
            Json(WebhookResponse::rejected(message))
        }
    }
}

async fn submit(state: &AppState, req: GenerateRequest) -> Result<GenerateResponse, ServerError> {
    req.validate()?;
    let task_id = state.scheduler.submit(req.into()).await?;
    let created_at = state
        .scheduler
        .status(task_id)
        .await
        .map(|record| record.created_at)
        .unwrap_or_else(|_| Utc::now());
    info!(%task_id, "generation task accepted");

    Ok(GenerateResponse {
        task_id: task_id.to_string(),
        status: TaskStatus::Pending.to_string(),
        message: "Video generation task created".to_owned(),
        created_at: created_at.to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;

    use crate::config::Config;
    use crate::routes::build;
    use crate::routes::test_util::{post_json, send};
    use crate::state::test_support::state_with;

    #[tokio::test]
    async fn generate_returns_pending_task() {
        let app = build(state_with(Config::default()));
        let (status, body) = send(
            &app,
            post_json("/api/v1/generate", json!({ "prompt": "a red sunset", "platform": "youtube" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        assert!(body["task_id"].as_str().unwrap().parse::<uuid::Uuid>().is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(body["created_at"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn blank_prompt_is_bad_request() {
        let app = build(state_with(Config::default()));
        let (status, body) = send(&app, post_json("/api/v1/generate", json!({ "prompt": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "prompt must not be empty");
    }

    #[tokio::test]
    async fn out_of_bounds_field_is_unprocessable() {
        let app = build(state_with(Config::default()));
        let (status, body) = send(
            &app,
            post_json("/api/v1/generate", json!({ "prompt": "ok", "fps": 1000 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("fps"));
    }

    #[tokio::test]
    async fn api_key_is_required_when_auth_enabled() {
        let config = Config {
            enable_auth: true,
            api_key: Some("secret".into()),
            ..Config::default()
        };
        let app = build(state_with(config));

        let (status, _) = send(&app, post_json("/api/v1/generate", json!({ "prompt": "sky" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let req = Request::post("/api/v1/generate")
            .header("content-type", "application/json")
            .header("x-api-key", "secret")
            .body(Body::from(json!({ "prompt": "sky" }).to_string()))
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);

        // Status polling stays open.
        let (status, _) = send(&app, crate::routes::test_util::get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn webhook_reports_outcome_in_body() {
        let app = build(state_with(Config::default()));

        let (status, body) = send(&app, post_json("/api/v1/webhook/n8n", json!({ "prompt": "ocean" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let task_id = body["task_id"].as_str().unwrap();
        assert_eq!(body["poll_url"], format!("/api/v1/status/{task_id}"));

        let (status, body) = send(&app, post_json("/api/v1/webhook/n8n", json!({ "prompt": "" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

        let malformed = Request::post("/api/v1/webhook/n8n")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, malformed).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
    }
}
