//! Task status, listing and retention endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use clipforge_core::TaskId;
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::task::{ParametersResponse, PurgeQuery, PurgeResponse, TaskStatusResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_status, list_tasks, purge_tasks),
    components(schemas(TaskStatusResponse, ParametersResponse, PurgeResponse))
)]
pub struct TasksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status/{task_id}", get(get_status))
        .route("/tasks", get(list_tasks))
        .route("/tasks/purge", post(purge_tasks))
}

#[utoipa::path(
    get,
    path = "/api/v1/status/{task_id}",
    tag = "tasks",
    params(("task_id" = String, Path, description = "Task identifier")),
    responses(
        (status = 200, description = "Current task state", body = TaskStatusResponse),
        (status = 404, description = "Unknown or purged task"),
    )
)]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatusResponse>, ServerError> {
    // A malformed id can never name a task.
    let id: TaskId = task_id
        .parse()
        .map_err(|_| ServerError::NotFound(format!("task {task_id} not found")))?;
    let record = state.scheduler.status(id).await?;
    Ok(Json(record.into()))
}

/// Every tracked task, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/tasks",
    tag = "tasks",
    responses((status = 200, description = "All tracked tasks", body = [TaskStatusResponse]))
)]
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<TaskStatusResponse>> {
    let records = state.scheduler.list().await;
    Json(records.into_iter().map(TaskStatusResponse::from).collect())
}

/// Run a retention sweep now.
#[utoipa::path(
    post,
    path = "/api/v1/tasks/purge",
    tag = "tasks",
    params(PurgeQuery),
    responses((status = 200, description = "Number of tasks removed", body = PurgeResponse))
)]
pub async fn purge_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PurgeQuery>,
) -> Json<PurgeResponse> {
    let max_age_hours = query.max_age_hours.unwrap_or(state.config.retention_hours);
    let purged = state.scheduler.purge_older_than(max_age_hours).await;
    info!(purged, max_age_hours, "on-demand purge finished");
    Json(PurgeResponse {
        purged,
        max_age_hours,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::Router;
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::config::Config;
    use crate::routes::build;
    use crate::routes::test_util::{get, post_json, send};
    use crate::state::test_support::state_with;

    async fn submit(app: &Router, prompt: &str) -> String {
        let (_, body) = send(app, post_json("/api/v1/generate", json!({ "prompt": prompt }))).await;
        body["task_id"].as_str().unwrap().to_owned()
    }

    async fn wait_terminal(app: &Router, task_id: &str) -> Value {
        for _ in 0..500 {
            let (status, body) = send(app, get(&format!("/api/v1/status/{task_id}"))).await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] == "completed" || body["status"] == "failed" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {task_id} did not finish");
    }

    #[tokio::test]
    async fn completed_task_exposes_download_url() {
        let app = build(state_with(Config::default()));
        let task_id = submit(&app, "green forest").await;

        let body = wait_terminal(&app, &task_id).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["progress"], 100);
        assert_eq!(body["video_url"], format!("/api/v1/download/{task_id}.mp4"));
        assert_eq!(body["error"], Value::Null);
        assert_eq!(body["parameters"]["width"], 1024);
        assert!(body["completed_at"].is_string());
    }

    #[tokio::test]
    async fn failed_task_reports_error() {
        let app = build(state_with(Config::default()));
        let task_id = submit(&app, "explode please").await;

        let body = wait_terminal(&app, &task_id).await;
        assert_eq!(body["status"], "failed");
        assert_eq!(body["error"], "renderer exploded");
        assert_eq!(body["video_url"], Value::Null);
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let app = build(state_with(Config::default()));
        let (status, body) = send(&app, get(&format!("/api/v1/status/{}", uuid::Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());

        let (status, _) = send(&app, get("/api/v1/status/not-a-task")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_and_purge() {
        let app = build(state_with(Config::default()));
        let first = submit(&app, "one").await;
        let second = submit(&app, "two").await;
        wait_terminal(&app, &first).await;
        wait_terminal(&app, &second).await;

        let (status, body) = send(&app, get("/api/v1/tasks")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        // Nothing is older than the default retention yet.
        let (_, body) = send(&app, post_json("/api/v1/tasks/purge", json!({}))).await;
        assert_eq!(body["purged"], 0);
        assert_eq!(body["max_age_hours"], 24);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let (status, body) = send(&app, post_json("/api/v1/tasks/purge?max_age_hours=0", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["purged"], 2);

        let (status, _) = send(&app, get(&format!("/api/v1/status/{first}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
