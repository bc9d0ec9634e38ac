//! Frame sinks: MP4 through an external ffmpeg, GIF in-process.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ffmpeg_sidecar::command::{FfmpegCommand, ffmpeg_is_installed};
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, RgbImage};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use tracing::{debug, info, warn};

use super::{ProgressReporter, RenderError};

/// Container written by the pattern renderer.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    /// H.264 in MP4, encoded by ffmpeg.
    #[default]
    Mp4,
    /// Animated GIF; needs no external tool.
    Gif,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        self.into()
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "video/mp4",
            OutputFormat::Gif => "image/gif",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        ext.parse().ok()
    }
}

/// Frame geometry shared by every frame of one clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frames: u64,
}

/// Encode `geometry.frames` frames produced by `frame_at` into `path`.
///
/// Progress is reported once per encoded frame.
pub fn encode<F>(
    format: OutputFormat,
    path: &Path,
    geometry: FrameGeometry,
    frame_at: F,
    progress: &ProgressReporter,
) -> Result<(), RenderError>
where
    F: FnMut(u64) -> RgbImage,
{
    match format {
        OutputFormat::Mp4 => encode_mp4(path, geometry, frame_at, progress),
        OutputFormat::Gif => encode_gif(path, geometry, frame_at, progress),
    }
}

fn encode_gif<F>(
    path: &Path,
    geometry: FrameGeometry,
    mut frame_at: F,
    progress: &ProgressReporter,
) -> Result<(), RenderError>
where
    F: FnMut(u64) -> RgbImage,
{
    let file = BufWriter::new(File::create(path)?);
    let mut encoder = GifEncoder::new_with_speed(file, 10);
    encoder.set_repeat(Repeat::Infinite)?;
    let delay = Delay::from_numer_denom_ms(1000, geometry.fps.max(1));

    for index in 0..geometry.frames {
        let rgba = DynamicImage::ImageRgb8(frame_at(index)).into_rgba8();
        encoder.encode_frame(Frame::from_parts(rgba, 0, 0, delay))?;
        progress.report_fraction(index + 1, geometry.frames);
    }
    Ok(())
}

fn encode_mp4<F>(
    path: &Path,
    geometry: FrameGeometry,
    mut frame_at: F,
    progress: &ProgressReporter,
) -> Result<(), RenderError>
where
    F: FnMut(u64) -> RgbImage,
{
    let output = path
        .to_str()
        .ok_or_else(|| RenderError::Encoder(format!("non UTF-8 output path: {}", path.display())))?;

    let mut child = FfmpegCommand::new()
        .hide_banner()
        .overwrite()
        .format("rawvideo")
        .pix_fmt("rgb24")
        .size(geometry.width, geometry.height)
        .rate(geometry.fps as f32)
        .input("-")
        // libx264 with yuv420p needs even dimensions.
        .args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"])
        .codec_video("libx264")
        .pix_fmt("yuv420p")
        .output(output)
        .spawn()?;

    let mut stdin = child
        .take_stdin()
        .ok_or_else(|| RenderError::Encoder("ffmpeg stdin unavailable".into()))?;
    let events = child
        .iter()
        .map_err(|e| RenderError::Encoder(e.to_string()))?;

    // Drain ffmpeg's output concurrently so a full stderr pipe cannot stall it.
    let log_thread = std::thread::spawn(move || {
        let mut last_error = None;
        for event in events {
            match event {
                FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, msg) => {
                    warn!("[FFmpeg] {}", msg);
                    last_error = Some(msg);
                }
                FfmpegEvent::Log(level, msg) => debug!("[FFmpeg {:?}] {}", level, msg),
                FfmpegEvent::Error(e) => {
                    warn!("FFmpeg error: {}", e);
                    last_error = Some(e);
                }
                _ => {}
            }
        }
        last_error
    });

    let mut written = Ok(());
    for index in 0..geometry.frames {
        let frame = frame_at(index);
        if let Err(e) = stdin.write_all(frame.as_raw()) {
            written = Err(e);
            break;
        }
        progress.report_fraction(index + 1, geometry.frames);
    }
    drop(stdin);

    let last_error = log_thread.join().unwrap_or_default();
    let status = child.wait()?;

    if !status.success() {
        return Err(RenderError::Encoder(last_error.unwrap_or_else(|| {
            format!("ffmpeg exited with {status}")
        })));
    }
    written?;
    info!(path = %path.display(), "ffmpeg finished encoding");
    Ok(())
}

/// Whether an ffmpeg binary can be found.
pub fn ffmpeg_available() -> bool {
    ffmpeg_is_installed()
}

/// Make sure ffmpeg is usable, downloading a static build if allowed.
pub fn ensure_ffmpeg(auto_download: bool) -> Result<(), RenderError> {
    if ffmpeg_is_installed() {
        return Ok(());
    }
    if !auto_download {
        return Err(RenderError::Encoder("ffmpeg not found".into()));
    }
    info!("ffmpeg not found; downloading a static build");
    ffmpeg_sidecar::download::auto_download().map_err(|e| RenderError::Encoder(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_and_mime_types() {
        assert_eq!(OutputFormat::default(), OutputFormat::Mp4);
        assert_eq!("GIF".parse::<OutputFormat>().unwrap(), OutputFormat::Gif);
        assert_eq!(OutputFormat::Mp4.extension(), "mp4");
        assert_eq!(OutputFormat::Gif.mime_type(), "image/gif");
        assert_eq!(OutputFormat::from_extension("webm"), None);
    }

    #[test]
    fn gif_encoding_writes_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.gif");
        let geometry = FrameGeometry {
            width: 8,
            height: 6,
            fps: 5,
            frames: 5,
        };
        let progress = ProgressReporter::detached();
        let mut calls = 0;
        encode(
            OutputFormat::Gif,
            &path,
            geometry,
            |i| {
                calls += 1;
                RgbImage::from_pixel(8, 6, image::Rgb([i as u8 * 40, 0, 0]))
            },
            &progress,
        )
        .unwrap();

        assert_eq!(calls, 5);
        assert_eq!(progress.current(), 100);
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"GIF89a"));
    }
}
