//! Request / response types for clip generation (`/api/v1/generate`).

use clipforge_core::{GenerationRequest, Overrides};
use clipforge_core::params::{DEFAULT_GUIDANCE_SCALE, DEFAULT_INFERENCE_STEPS};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for `POST /api/v1/generate` and `POST /api/v1/webhook/n8n`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct GenerateRequest {
    /// Text description of the clip.
    #[validate(length(min = 1, max = 2000))]
    pub prompt: String,
    /// Things the clip should avoid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    /// `instagram`, `youtube`, `youtube_shorts` or `default`; unknown names
    /// use `default`.
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 64, max = 4096))]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 64, max = 4096))]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 120))]
    pub fps: Option<u32>,
    /// Seconds; clamped to the platform's maximum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 600))]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default = "default_steps")]
    #[validate(range(min = 1, max = 500))]
    pub num_inference_steps: u32,
    #[serde(default = "default_guidance")]
    #[validate(range(min = 0.0, max = 50.0))]
    pub guidance_scale: f32,
}

fn default_platform() -> String {
    "default".to_owned()
}

fn default_steps() -> u32 {
    DEFAULT_INFERENCE_STEPS
}

fn default_guidance() -> f32 {
    DEFAULT_GUIDANCE_SCALE
}

impl From<GenerateRequest> for GenerationRequest {
    fn from(req: GenerateRequest) -> Self {
        GenerationRequest {
            prompt: req.prompt,
            negative_prompt: req.negative_prompt,
            platform: req.platform,
            overrides: Overrides {
                width: req.width,
                height: req.height,
                fps: req.fps,
                duration: req.duration,
            },
            seed: req.seed,
            num_inference_steps: Some(req.num_inference_steps),
            guidance_scale: Some(req.guidance_scale),
        }
    }
}

/// Response body for `POST /api/v1/generate`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateResponse {
    pub task_id: String,
    /// Always `"pending"` at submission time.
    pub status: String,
    pub message: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

/// Response body for `POST /api/v1/webhook/n8n`.
///
/// Always returned with HTTP 200; `success` tells the workflow what happened.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Where to poll for progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookResponse {
    pub fn accepted(created: GenerateResponse) -> Self {
        Self {
            success: true,
            poll_url: Some(format!("/api/v1/status/{}", created.task_id)),
            task_id: Some(created.task_id),
            status: Some(created.status),
            message: Some("Video generation task created successfully".to_owned()),
            created_at: Some(created.created_at),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            task_id: None,
            status: None,
            message: None,
            poll_url: None,
            created_at: None,
            error: Some(error.into()),
        }
    }
}
