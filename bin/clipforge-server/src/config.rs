//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;

use clipforge_core::{OutputFormat, Platform, ProfileTable};
use strum::IntoEnumIterator;

/// Runtime configuration for clipforge-server.
///
/// Every field has a default so the server runs without any environment
/// variables set.  Values that fail to parse fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Directory rendered clips are written to and served from.
    pub output_dir: PathBuf,

    /// Scratch directory, created at startup.
    pub temp_dir: PathBuf,

    /// Size of the render worker pool.
    pub workers: usize,

    /// Finished tasks older than this are purged.
    pub retention_hours: u64,

    /// Period of the background retention sweep.
    pub sweep_interval_secs: u64,

    pub output_format: OutputFormat,

    /// Compute device reported by the health endpoint.
    pub device: String,

    /// Require `x-api-key` on generation routes.
    pub enable_auth: bool,
    pub api_key: Option<String>,

    /// Comma-separated allowed origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    pub enable_swagger: bool,

    /// Download a static ffmpeg build at startup when none is installed.
    pub ffmpeg_auto_download: bool,

    /// Platform profiles, with per-field overrides applied.
    pub profiles: ProfileTable,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        Self {
            bind_address: env.or("CLIPFORGE_BIND", "0.0.0.0:8000"),
            log_level: env.or("CLIPFORGE_LOG", "info"),
            log_json: env.flag("CLIPFORGE_LOG_JSON", false),
            output_dir: env.or("CLIPFORGE_OUTPUT_DIR", "outputs").into(),
            temp_dir: env.or("CLIPFORGE_TEMP_DIR", "temp").into(),
            workers: env.parse("CLIPFORGE_WORKERS", 4usize).max(1),
            retention_hours: env.parse("CLIPFORGE_RETENTION_HOURS", 24),
            sweep_interval_secs: env.parse("CLIPFORGE_SWEEP_INTERVAL_SECS", 3600),
            output_format: env.parse("CLIPFORGE_OUTPUT_FORMAT", OutputFormat::Mp4),
            device: env.or("CLIPFORGE_DEVICE", "cpu"),
            enable_auth: env.flag("CLIPFORGE_ENABLE_AUTH", false),
            api_key: env.get("CLIPFORGE_API_KEY"),
            cors_allowed_origins: env.get("CLIPFORGE_CORS_ORIGINS"),
            enable_swagger: env.flag("CLIPFORGE_ENABLE_SWAGGER", true),
            ffmpeg_auto_download: env.flag("CLIPFORGE_FFMPEG_AUTO_DOWNLOAD", false),
            profiles: env.profiles(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Non-blank value of `key`.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }

    fn positive(&self, key: &str) -> Option<u32> {
        self.get(key)
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
    }

    /// `CLIPFORGE_PROFILE_<PLATFORM>_<FIELD>` overrides on top of the built-in table.
    fn profiles(&self) -> ProfileTable {
        let mut table = ProfileTable::default();
        for platform in Platform::iter() {
            let prefix = format!("CLIPFORGE_PROFILE_{}", platform.as_str().to_ascii_uppercase());
            let profile = table.get_mut(platform);

            if let Some(v) = self.positive(&format!("{prefix}_WIDTH")) {
                profile.width = v;
            }
            if let Some(v) = self.positive(&format!("{prefix}_HEIGHT")) {
                profile.height = v;
            }
            if let Some(v) = self.positive(&format!("{prefix}_FPS")) {
                profile.fps = v;
            }
            if let Some(v) = self.positive(&format!("{prefix}_DURATION")) {
                profile.default_duration = v;
            }
            match self.get(&format!("{prefix}_MAX_DURATION")).as_deref() {
                Some("0") => profile.max_duration = None,
                Some(v) if v.eq_ignore_ascii_case("none") => profile.max_duration = None,
                Some(v) => {
                    if let Ok(max) = v.parse::<u32>() {
                        profile.max_duration = Some(max);
                    }
                }
                None => {}
            }
        }
        table
    }
}
