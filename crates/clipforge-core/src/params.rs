//! Generation requests and the immutable parameter snapshot stored per task.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::profile::{Overrides, ProfileTable, ResolvedParameters};

/// Longest accepted prompt, in characters.
pub const MAX_PROMPT_CHARS: usize = 2000;
pub const DEFAULT_INFERENCE_STEPS: u32 = 50;
pub const DEFAULT_GUIDANCE_SCALE: f32 = 7.5;

/// A request to generate one clip, as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    /// Platform name; resolved leniently (see [`crate::profile::Platform`]).
    pub platform: String,
    pub overrides: Overrides,
    pub seed: Option<u64>,
    pub num_inference_steps: Option<u32>,
    pub guidance_scale: Option<f32>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            platform: "default".to_owned(),
            ..Default::default()
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.overrides.duration = Some(seconds);
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.overrides.width = Some(width);
        self.overrides.height = Some(height);
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.overrides.fps = Some(fps);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the prompt and resolve output settings against `profiles`.
    pub fn resolve(self, profiles: &ProfileTable) -> Result<GenerationParameters, ValidationError> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(ValidationError::PromptTooLong {
                max: MAX_PROMPT_CHARS,
            });
        }
        let guidance_scale = self.guidance_scale.unwrap_or(DEFAULT_GUIDANCE_SCALE);
        if !guidance_scale.is_finite() {
            return Err(ValidationError::NonFinite {
                field: "guidance_scale",
            });
        }
        let resolved = profiles.resolve(&self.platform, &self.overrides)?;

        Ok(GenerationParameters {
            prompt: prompt.to_owned(),
            negative_prompt: self.negative_prompt.filter(|p| !p.trim().is_empty()),
            seed: self.seed,
            num_inference_steps: self
                .num_inference_steps
                .unwrap_or(DEFAULT_INFERENCE_STEPS),
            guidance_scale,
            resolved,
        })
    }
}

/// Parameters captured at submission time.
///
/// A task keeps this snapshot for its whole lifetime; later changes to the
/// profile table do not affect it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParameters {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub seed: Option<u64>,
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
    #[serde(flatten)]
    pub resolved: ResolvedParameters,
}

// Bitwise float comparison keeps equality reflexive, which the store's
// immutability check relies on.
impl PartialEq for GenerationParameters {
    fn eq(&self, other: &Self) -> bool {
        self.prompt == other.prompt
            && self.negative_prompt == other.negative_prompt
            && self.seed == other.seed
            && self.num_inference_steps == other.num_inference_steps
            && self.guidance_scale.to_bits() == other.guidance_scale.to_bits()
            && self.resolved == other.resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Platform;

    #[test]
    fn resolve_applies_defaults_and_trims_prompt() {
        let params = GenerationRequest::new("  a red sunset  ")
            .with_platform("YouTube")
            .resolve(&ProfileTable::default())
            .unwrap();
        assert_eq!(params.prompt, "a red sunset");
        assert_eq!(params.resolved.platform, Platform::Youtube);
        assert_eq!(params.num_inference_steps, DEFAULT_INFERENCE_STEPS);
        assert_eq!(params.guidance_scale, DEFAULT_GUIDANCE_SCALE);
        assert_eq!(params.negative_prompt, None);
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let err = GenerationRequest::new("   ")
            .resolve(&ProfileTable::default())
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyPrompt);
    }

    #[test]
    fn oversized_prompt_is_rejected() {
        let err = GenerationRequest::new("x".repeat(MAX_PROMPT_CHARS + 1))
            .resolve(&ProfileTable::default())
            .unwrap_err();
        assert!(matches!(err, ValidationError::PromptTooLong { .. }));
    }

    #[test]
    fn non_finite_guidance_scale_is_rejected() {
        for value in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let request = GenerationRequest {
                guidance_scale: Some(value),
                ..GenerationRequest::new("ocean")
            };
            assert_eq!(
                request.resolve(&ProfileTable::default()),
                Err(ValidationError::NonFinite {
                    field: "guidance_scale"
                })
            );
        }
    }

    #[test]
    fn parameters_equal_themselves_even_with_nan() {
        let mut params = GenerationRequest::new("ocean")
            .resolve(&ProfileTable::default())
            .unwrap();
        params.guidance_scale = f32::NAN;
        assert_eq!(params, params.clone());
    }

    #[test]
    fn snapshot_is_independent_of_later_profile_changes() {
        let mut table = ProfileTable::default();
        let params = GenerationRequest::new("ocean").resolve(&table).unwrap();
        table.default.width = 320;
        assert_eq!(params.resolved.width, 1024);
    }
}
