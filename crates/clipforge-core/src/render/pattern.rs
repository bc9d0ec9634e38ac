//! Placeholder generator: an animated gradient tinted by prompt keywords.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use tracing::{info, warn};

use super::encode::{self, FrameGeometry, OutputFormat};
use super::{ProgressReporter, RenderBackend, RenderError, RenderJob};
use crate::runtime::types::TaskId;

const PALETTE: [(&str, [u8; 3]); 11] = [
    ("red", [255, 50, 50]),
    ("blue", [50, 50, 255]),
    ("green", [50, 255, 50]),
    ("yellow", [255, 255, 50]),
    ("purple", [200, 50, 255]),
    ("orange", [255, 150, 50]),
    ("pink", [255, 100, 200]),
    ("ocean", [50, 100, 255]),
    ("sunset", [255, 100, 50]),
    ("forest", [50, 150, 50]),
    ("sky", [100, 150, 255]),
];

const FALLBACK_COLOR: [u8; 3] = [100, 100, 200];

/// Base color for a prompt: the first palette keyword it contains.
pub fn base_color(prompt: &str) -> Rgb<u8> {
    let prompt = prompt.to_lowercase();
    let color = PALETTE
        .iter()
        .find(|(keyword, _)| prompt.contains(keyword))
        .map_or(FALLBACK_COLOR, |(_, color)| *color);
    Rgb(color)
}

/// Frame `index` of `total`.
///
/// Every channel is shifted by a per-frame offset plus a position term, all
/// modulo 256.
pub fn pattern_frame(
    width: u32,
    height: u32,
    base: Rgb<u8>,
    phase: u8,
    index: u64,
    total: u64,
) -> RgbImage {
    let step = if total == 0 { 0 } else { index * 255 / total };
    let offset = step as u32 + u32::from(phase);
    let [r, g, b] = base.0.map(u32::from);

    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((r + offset + x / 10) % 256) as u8,
            ((g + offset + y / 10) % 256) as u8,
            ((b + offset + (x + y) / 20) % 256) as u8,
        ])
    })
}

/// Writes `<output_dir>/<task_id>.<ext>`.
#[derive(Debug, Clone)]
pub struct PatternRenderer {
    output_dir: PathBuf,
    format: OutputFormat,
}

impl PatternRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn output_path(&self, task_id: TaskId) -> PathBuf {
        self.output_dir
            .join(format!("{task_id}.{}", self.format.extension()))
    }
}

impl RenderBackend for PatternRenderer {
    fn render(&self, job: &RenderJob, progress: &ProgressReporter) -> Result<PathBuf, RenderError> {
        let params = &job.parameters;
        let resolved = &params.resolved;
        let geometry = FrameGeometry {
            width: resolved.width,
            height: resolved.height,
            fps: resolved.fps,
            frames: resolved.frame_count(),
        };
        let base = base_color(&params.prompt);
        let phase = params.seed.map_or(0, |seed| (seed % 256) as u8);

        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_path(job.task_id);

        let result = encode::encode(
            self.format,
            &path,
            geometry,
            |index| {
                pattern_frame(
                    geometry.width,
                    geometry.height,
                    base,
                    phase,
                    index,
                    geometry.frames,
                )
            },
            progress,
        );

        if let Err(e) = result {
            match std::fs::remove_file(&path) {
                Err(cleanup) if cleanup.kind() != std::io::ErrorKind::NotFound => {
                    warn!(path = %path.display(), error = %cleanup, "failed to remove partial output");
                }
                _ => {}
            }
            return Err(e);
        }

        info!(task_id = %job.task_id, path = %path.display(), frames = geometry.frames, "clip rendered");
        Ok(path)
    }
}
