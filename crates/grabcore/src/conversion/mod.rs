//! Media conversion for delivery.
//!
//! Oversized videos are re-encoded to fit the Bot API upload limit:
//! - [`Transcoder`]: the compression seam (ffmpeg in production)
//! - [`policy::ensure_deliverable`]: decides whether an item needs it and
//!   verifies the result

pub mod policy;
pub mod video;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

pub use policy::{ensure_deliverable, Deliverable};
pub use video::FfmpegTranscoder;

/// Errors that can occur during conversion
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Output creation failed: {0}")]
    OutputFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("File size exceeds limit: {actual} > {limit}")]
    SizeExceeded { actual: u64, limit: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },
}

pub type ConversionResult<T> = Result<T, ConversionError>;

/// Re-encodes a video so it lands under a size target.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Writes a compressed copy of `input` to `output`, aiming at
    /// `target_mb` megabytes. Callers verify the result size.
    async fn compress(&self, input: &Path, output: &Path, target_mb: u64) -> ConversionResult<()>;
}

/// Check if ffmpeg is available
pub async fn check_ffmpeg(bin: &str) -> bool {
    crate::core::process::tool_available(bin, "-version").await
}

/// Get file size in bytes
pub async fn get_file_size<P: AsRef<Path>>(path: P) -> ConversionResult<u64> {
    let metadata = tokio::fs::metadata(path).await?;
    Ok(metadata.len())
}
