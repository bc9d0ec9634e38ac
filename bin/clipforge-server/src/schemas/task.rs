//! Task status views (`/api/v1/status/{task_id}`, `/api/v1/tasks`).

use std::path::Path;

use clipforge_core::{GenerationParameters, TaskRecord};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Generation settings a task was submitted with.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ParametersResponse {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub platform: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Effective duration in seconds.
    pub duration: u32,
    pub max_duration: Option<u32>,
    pub seed: Option<u64>,
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
}

impl From<&GenerationParameters> for ParametersResponse {
    fn from(p: &GenerationParameters) -> Self {
        Self {
            prompt: p.prompt.clone(),
            negative_prompt: p.negative_prompt.clone(),
            platform: p.resolved.platform.to_string(),
            width: p.resolved.width,
            height: p.resolved.height,
            fps: p.resolved.fps,
            duration: p.resolved.duration,
            max_duration: p.resolved.max_duration,
            seed: p.seed,
            num_inference_steps: p.num_inference_steps,
            guidance_scale: p.guidance_scale,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskStatusResponse {
    pub task_id: String,
    /// `pending`, `processing`, `completed` or `failed`.
    pub status: String,
    /// 0–100.
    pub progress: u8,
    pub message: String,
    /// Download URL; present once completed.
    pub video_url: Option<String>,
    /// Present once failed.
    pub error: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub parameters: ParametersResponse,
}

impl From<TaskRecord> for TaskStatusResponse {
    fn from(r: TaskRecord) -> Self {
        Self {
            task_id: r.id.to_string(),
            status: r.status.to_string(),
            progress: r.progress,
            message: r.message,
            video_url: r.artifact_ref.as_deref().and_then(download_url),
            error: r.error,
            created_at: r.created_at.to_rfc3339(),
            completed_at: r.completed_at.map(|t| t.to_rfc3339()),
            parameters: ParametersResponse::from(&r.parameters),
        }
    }
}

/// Public URL of an artifact in the output directory.
pub fn download_url(artifact_ref: &str) -> Option<String> {
    let name = Path::new(artifact_ref).file_name()?.to_str()?;
    Some(format!("/api/v1/download/{name}"))
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct PurgeQuery {
    /// Age threshold in hours; defaults to the configured retention.
    pub max_age_hours: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurgeResponse {
    pub purged: usize,
    pub max_age_hours: u64,
}
