//! Compression engine.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use vpress_models::MediaKind;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Turns a raw upload into a smaller artifact.
///
/// Implementations are opaque and may run for a long time. They either
/// return the path of the produced artifact or an error.
#[async_trait]
pub trait CompressionEngine: Send + Sync {
    async fn compress(&self, input: &Path) -> MediaResult<PathBuf>;
}

/// Compression parameters.
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Directory compressed artifacts are written to
    pub output_dir: PathBuf,
    /// Target video height; width follows the aspect ratio
    pub target_height: u32,
    /// x264 CRF for video
    pub video_crf: u8,
    /// x264 preset
    pub preset: String,
    /// AAC bitrate
    pub audio_bitrate: String,
    /// JPEG/WebP quality scale for images
    pub image_quality: u8,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            target_height: 720,
            video_crf: 30,
            preset: "slow".to_string(),
            audio_bitrate: "128k".to_string(),
            image_quality: 10,
        }
    }
}

impl CompressionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            output_dir: std::env::var("COMPRESS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            target_height: std::env::var("COMPRESS_TARGET_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.target_height),
            video_crf: std::env::var("COMPRESS_VIDEO_CRF")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.video_crf),
            preset: std::env::var("COMPRESS_PRESET").unwrap_or(defaults.preset),
            audio_bitrate: std::env::var("COMPRESS_AUDIO_BITRATE").unwrap_or(defaults.audio_bitrate),
            image_quality: std::env::var("COMPRESS_IMAGE_QUALITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.image_quality),
        }
    }
}

/// [`CompressionEngine`] backed by the FFmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegCompressor {
    config: CompressionConfig,
    runner: FfmpegRunner,
}

impl FfmpegCompressor {
    pub fn new(config: CompressionConfig) -> Self {
        Self {
            config,
            runner: FfmpegRunner::new(),
        }
    }

    /// Replace the process runner.
    pub fn with_runner(mut self, runner: FfmpegRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Where the artifact for `input` is written: `compressed_<file name>`.
    pub fn output_path_for(&self, input: &Path) -> MediaResult<PathBuf> {
        let name = input
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MediaError::UnsupportedFormat(input.display().to_string()))?;
        Ok(self.config.output_dir.join(format!("compressed_{}", name)))
    }

    /// Build the FFmpeg invocation for one input.
    pub fn build_command(&self, input: &Path, output: &Path, kind: MediaKind) -> FfmpegCommand {
        let cmd = FfmpegCommand::new(input, output);
        match kind {
            MediaKind::Video => cmd
                .scale_to_height(self.config.target_height)
                .video_codec("libx264")
                .crf(self.config.video_crf)
                .preset(self.config.preset.clone())
                .audio_codec("aac")
                .audio_bitrate(self.config.audio_bitrate.clone())
                .faststart(),
            MediaKind::Image => cmd.image_quality(self.config.image_quality),
        }
    }
}

#[async_trait]
impl CompressionEngine for FfmpegCompressor {
    async fn compress(&self, input: &Path) -> MediaResult<PathBuf> {
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let kind = MediaKind::from_path(input)
            .ok_or_else(|| MediaError::UnsupportedFormat(input.display().to_string()))?;
        let output = self.output_path_for(input)?;
        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let cmd = self.build_command(input, &output, kind);
        let started = std::time::Instant::now();
        self.runner.run(&cmd).await?;

        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(MediaError::ffmpeg_failed(
                format!("FFmpeg produced no output at {}", output.display()),
                None,
                None,
            ));
        }

        info!(
            input = %input.display(),
            output = %output.display(),
            kind = kind.as_str(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Compression finished"
        );
        Ok(output)
    }
}
