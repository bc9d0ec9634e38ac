//! `clipforge-server render`: one clip, rendered in the foreground.

use std::path::PathBuf;

use clap::Args;
use clipforge_core::render::encode::ensure_ffmpeg;
use clipforge_core::{
    GenerationRequest, OutputFormat, Overrides, PatternRenderer, ProgressReporter, RenderBackend,
    RenderJob, TaskId,
};
use tracing::info;

use crate::config::Config;

#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    /// Text description of the clip.
    #[arg(long)]
    pub prompt: String,

    #[arg(long)]
    pub negative_prompt: Option<String>,

    /// instagram, youtube, youtube_shorts or default.
    #[arg(long, default_value = "default")]
    pub platform: String,

    /// Seconds; clamped to the platform maximum.
    #[arg(long)]
    pub duration: Option<u32>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    #[arg(long)]
    pub fps: Option<u32>,

    #[arg(long)]
    pub seed: Option<u64>,

    /// mp4 or gif (defaults to CLIPFORGE_OUTPUT_FORMAT).
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Defaults to CLIPFORGE_OUTPUT_DIR.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

impl RenderArgs {
    fn to_request(&self) -> GenerationRequest {
        GenerationRequest {
            prompt: self.prompt.clone(),
            negative_prompt: self.negative_prompt.clone(),
            platform: self.platform.clone(),
            overrides: Overrides {
                width: self.width,
                height: self.height,
                fps: self.fps,
                duration: self.duration,
            },
            seed: self.seed,
            num_inference_steps: None,
            guidance_scale: None,
        }
    }
}

/// Resolve `args` the way the service does and render synchronously.
/// Returns the artifact path.
pub async fn render(args: RenderArgs, cfg: &Config) -> anyhow::Result<PathBuf> {
    let format = args.format.unwrap_or(cfg.output_format);
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| cfg.output_dir.clone());

    if format == OutputFormat::Mp4 {
        let auto_download = cfg.ffmpeg_auto_download;
        tokio::task::spawn_blocking(move || ensure_ffmpeg(auto_download)).await??;
    }

    let parameters = args.to_request().resolve(&cfg.profiles)?;
    let resolved = parameters.resolved;
    println!(
        "{} {}x{} @ {} fps, {} s ({} frames) -> {}",
        resolved.platform,
        resolved.width,
        resolved.height,
        resolved.fps,
        resolved.duration,
        resolved.frame_count(),
        format,
    );

    let job = RenderJob {
        task_id: TaskId::random(),
        parameters,
    };
    info!(task_id = %job.task_id, "rendering in the foreground");

    let renderer = PatternRenderer::new(output_dir, format);
    let (reporter, mut progress_rx) = ProgressReporter::channel();
    let printer = tokio::spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let percent = *progress_rx.borrow_and_update();
            eprint!("\rrendering... {percent:>3}%");
        }
        eprintln!();
    });

    let path = tokio::task::spawn_blocking(move || renderer.render(&job, &reporter)).await??;
    printer.await?;

    println!("{}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(prompt: &str) -> RenderArgs {
        RenderArgs {
            prompt: prompt.to_owned(),
            negative_prompt: None,
            platform: "default".to_owned(),
            duration: Some(1),
            width: Some(32),
            height: Some(18),
            fps: Some(4),
            seed: Some(9),
            format: Some(OutputFormat::Gif),
            output_dir: None,
        }
    }

    #[tokio::test]
    async fn renders_gif_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args("sunset");
        args.output_dir = Some(dir.path().to_path_buf());

        let path = render(args, &Config::default()).await.unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("gif"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn invalid_prompt_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args("  ");
        args.output_dir = Some(dir.path().to_path_buf());
        assert!(render(args, &Config::default()).await.is_err());
    }
}
