//! FFmpeg CLI wrapper for media compression.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - A process runner that surfaces FFmpeg's stderr on failure
//! - The [`CompressionEngine`] seam and its FFmpeg implementation

pub mod command;
pub mod compress;
pub mod error;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use compress::{CompressionConfig, CompressionEngine, FfmpegCompressor};
pub use error::{MediaError, MediaResult};
