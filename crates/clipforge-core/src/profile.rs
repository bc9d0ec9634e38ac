//! Platform profiles and parameter resolution.
//!
//! A [`Profile`] is the bundle of default output settings for one target
//! platform.  [`ProfileTable::resolve`] merges a profile with the caller's
//! overrides and applies the platform's duration ceiling.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::ValidationError;

/// Duration (seconds) used when neither the caller nor the profile sets one.
pub const DEFAULT_DURATION_SECS: u32 = 5;

/// Target platform of a generation request.
///
/// Parsing is case-insensitive.  Use [`Platform::parse_lenient`] for request
/// input: unknown names resolve to [`Platform::Default`] instead of failing.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Platform {
    Instagram,
    Youtube,
    YoutubeShorts,
    Default,
}

impl Platform {
    /// Parse a platform name, falling back to [`Platform::Default`].
    pub fn parse_lenient(name: &str) -> Self {
        name.trim().parse().unwrap_or(Platform::Default)
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Default output settings for one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub default_duration: u32,
    /// Upper bound for the effective duration; `None` means unbounded.
    pub max_duration: Option<u32>,
}

/// The set of profiles, one per [`Platform`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileTable {
    pub instagram: Profile,
    pub youtube: Profile,
    pub youtube_shorts: Profile,
    pub default: Profile,
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self {
            instagram: Profile {
                width: 1080,
                height: 1920,
                fps: 30,
                default_duration: DEFAULT_DURATION_SECS,
                max_duration: Some(90),
            },
            youtube: Profile {
                width: 1920,
                height: 1080,
                fps: 30,
                default_duration: DEFAULT_DURATION_SECS,
                max_duration: None,
            },
            youtube_shorts: Profile {
                width: 1080,
                height: 1920,
                fps: 30,
                default_duration: DEFAULT_DURATION_SECS,
                max_duration: Some(60),
            },
            default: Profile {
                width: 1024,
                height: 576,
                fps: 24,
                default_duration: DEFAULT_DURATION_SECS,
                max_duration: None,
            },
        }
    }
}

/// Caller-supplied values that take precedence over the profile defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub duration: Option<u32>,
}

/// Fully merged output settings, captured once per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedParameters {
    pub platform: Platform,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Effective duration in seconds, already clamped to `max_duration`.
    pub duration: u32,
    pub max_duration: Option<u32>,
}

impl ResolvedParameters {
    pub fn frame_count(&self) -> u64 {
        u64::from(self.fps) * u64::from(self.duration)
    }
}

impl ProfileTable {
    pub fn get(&self, platform: Platform) -> &Profile {
        match platform {
            Platform::Instagram => &self.instagram,
            Platform::Youtube => &self.youtube,
            Platform::YoutubeShorts => &self.youtube_shorts,
            Platform::Default => &self.default,
        }
    }

    pub fn get_mut(&mut self, platform: Platform) -> &mut Profile {
        match platform {
            Platform::Instagram => &mut self.instagram,
            Platform::Youtube => &mut self.youtube,
            Platform::YoutubeShorts => &mut self.youtube_shorts,
            Platform::Default => &mut self.default,
        }
    }

    /// Merge the named profile with `overrides`.
    ///
    /// Unknown platform names use the `default` profile.  A duration above the
    /// profile's ceiling is clamped down to it without error.  The only
    /// failure is an explicit override of zero.
    pub fn resolve(
        &self,
        platform: &str,
        overrides: &Overrides,
    ) -> Result<ResolvedParameters, ValidationError> {
        let platform = Platform::parse_lenient(platform);
        let profile = self.get(platform);

        let width = pick("width", overrides.width, profile.width)?;
        let height = pick("height", overrides.height, profile.height)?;
        let fps = pick("fps", overrides.fps, profile.fps)?;
        let mut duration = pick("duration", overrides.duration, profile.default_duration)?;

        if let Some(max) = profile.max_duration {
            duration = duration.min(max);
        }

        Ok(ResolvedParameters {
            platform,
            width,
            height,
            fps,
            duration,
            max_duration: profile.max_duration,
        })
    }
}

fn pick(field: &'static str, value: Option<u32>, default: u32) -> Result<u32, ValidationError> {
    match value {
        Some(0) => Err(ValidationError::NonPositive { field }),
        Some(v) => Ok(v),
        None => Ok(default),
    }
}
