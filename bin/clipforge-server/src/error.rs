//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON `{"error": ...}`
//! body with a matching status code.
//!
//! Internal errors are logged with full detail; the caller only sees a
//! generic message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use clipforge_core::TaskError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the task runtime.
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// The body parsed but violates field constraints.
    #[error("unprocessable request: {0}")]
    Unprocessable(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Status code and the message safe to show to a client.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
            ServerError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),

            ServerError::Task(TaskError::Validation(e)) => (StatusCode::BAD_REQUEST, e.to_string()),
            ServerError::Task(TaskError::NotFound { task_id }) => {
                (StatusCode::NOT_FOUND, format!("task {task_id} not found"))
            }
            ServerError::Task(e) => {
                error!(error = %e, "task runtime error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = self.status_and_message();
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<validator::ValidationErrors> for ServerError {
    fn from(e: validator::ValidationErrors) -> Self {
        ServerError::Unprocessable(e.to_string())
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_core::{TaskId, ValidationError};

    #[test]
    fn runtime_errors_map_to_status_codes() {
        let validation = ServerError::from(TaskError::Validation(ValidationError::EmptyPrompt));
        assert_eq!(validation.status_and_message().0, StatusCode::BAD_REQUEST);

        let missing = ServerError::from(TaskError::NotFound {
            task_id: TaskId::random(),
        });
        assert_eq!(missing.status_and_message().0, StatusCode::NOT_FOUND);

        let (status, message) = ServerError::from(TaskError::SchedulerShutdown).status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "internal server error");
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let (_, message) = ServerError::Internal("/secret/path exploded".into()).status_and_message();
        assert!(!message.contains("secret"));
    }
}
