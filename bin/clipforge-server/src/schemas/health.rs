use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response body for `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub status: String,
    /// Path of the interactive API docs.
    pub docs: String,
}

/// Response body for `GET /api/v1/health`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Compute device the renderer runs on.
    pub device: String,
    pub available_platforms: Vec<String>,
}
