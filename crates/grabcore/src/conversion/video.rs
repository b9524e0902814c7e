//! Video compression with ffmpeg
//!
//! Fixed delivery profile: scale to 480p, H.264 `veryfast`, AAC 96k, video
//! bitrate derived from the duration so the file lands near the target.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{ConversionError, ConversionResult, Transcoder};
use crate::core::config;
use crate::core::process::{run_with_timeout, ProcessError, FFPROBE_TIMEOUT};

/// Output height of compressed videos
pub const TARGET_HEIGHT: u32 = 480;

/// AAC bitrate in kbit/s
pub const AUDIO_BITRATE_KBPS: u64 = 96;

/// Floor for the computed video bitrate in kbit/s
pub const MIN_VIDEO_BITRATE_KBPS: u64 = 100;

/// Video bitrate (kbit/s) that makes `duration_secs` of video plus audio
/// fit into `target_mb`.
pub fn video_bitrate_kbps(target_mb: u64, duration_secs: f64) -> u64 {
    if duration_secs <= 0.0 {
        return MIN_VIDEO_BITRATE_KBPS;
    }
    let total_kbits = target_mb as f64 * 1024.0 * 8.0;
    let total_kbps = total_kbits / duration_secs;
    let video = total_kbps - AUDIO_BITRATE_KBPS as f64;
    (video.floor() as u64).max(MIN_VIDEO_BITRATE_KBPS)
}

fn process_to_conversion(err: ProcessError) -> ConversionError {
    match err {
        ProcessError::Timeout { program, timeout } => ConversionError::Timeout {
            program,
            secs: timeout.as_secs(),
        },
        ProcessError::Spawn { program, source } => ConversionError::FfmpegError(format!("{}: {}", program, source)),
    }
}

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: String,
    ffprobe: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeout,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            config::FFMPEG_BIN.as_str(),
            config::FFPROBE_BIN.as_str(),
            config::download::ffmpeg_timeout(),
        )
    }

    /// Get video duration using ffprobe
    pub async fn read_duration(&self, path: &Path) -> ConversionResult<f64> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

        let output = run_with_timeout(&mut cmd, FFPROBE_TIMEOUT)
            .await
            .map_err(process_to_conversion)?;

        if !output.status.success() {
            return Err(ConversionError::FfmpegError(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let duration_str = String::from_utf8_lossy(&output.stdout);
        duration_str
            .trim()
            .parse::<f64>()
            .map_err(|_| ConversionError::FfmpegError("Failed to parse duration".to_string()))
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn compress(&self, input: &Path, output: &Path, target_mb: u64) -> ConversionResult<()> {
        if !input.exists() {
            return Err(ConversionError::InputNotFound(input.display().to_string()));
        }
        if target_mb == 0 {
            return Err(ConversionError::InvalidInput("target size must be at least 1MB".to_string()));
        }

        let duration = self.read_duration(input).await?;
        let bitrate = video_bitrate_kbps(target_mb, duration);
        log::info!(
            "🗜️ Compressing {} ({:.0}s) to ~{}MB at {}k",
            input.display(),
            duration,
            target_mb,
            bitrate
        );

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(input)
            .arg("-vf")
            .arg(format!("scale=-2:{}", TARGET_HEIGHT))
            .args(["-c:v", "libx264", "-preset", "veryfast"])
            .arg("-b:v")
            .arg(format!("{}k", bitrate))
            .arg("-maxrate")
            .arg(format!("{}k", bitrate))
            .arg("-bufsize")
            .arg(format!("{}k", bitrate * 2))
            .args(["-c:a", "aac"])
            .arg("-b:a")
            .arg(format!("{}k", AUDIO_BITRATE_KBPS))
            .args(["-movflags", "+faststart"])
            .arg(output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let result = run_with_timeout(&mut cmd, self.timeout)
            .await
            .map_err(process_to_conversion)?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            log::error!("FFmpeg compression error: {}", stderr);
            return Err(ConversionError::FfmpegError(stderr.to_string()));
        }

        if !output.exists() {
            return Err(ConversionError::OutputFailed(output.display().to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_bitrate_for_ten_minutes() {
        // 45MB over 600s = 614 kbit/s total, minus 96 for audio
        assert_eq!(video_bitrate_kbps(45, 600.0), 518);
    }

    #[test]
    fn test_video_bitrate_has_floor() {
        assert_eq!(video_bitrate_kbps(45, 100_000.0), MIN_VIDEO_BITRATE_KBPS);
        assert_eq!(video_bitrate_kbps(45, 0.0), MIN_VIDEO_BITRATE_KBPS);
    }

    #[tokio::test]
    async fn test_compress_missing_input() {
        let t = FfmpegTranscoder::new("ffmpeg", "ffprobe", Duration::from_secs(5));
        let err = t
            .compress(Path::new("/nonexistent/in.mp4"), Path::new("/tmp/out.mp4"), 45)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::InputNotFound(_)));
    }

    #[tokio::test]
    async fn test_compress_rejects_zero_target() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"x").unwrap();
        let t = FfmpegTranscoder::new("ffmpeg", "ffprobe", Duration::from_secs(5));
        let err = t.compress(&input, &dir.path().join("out.mp4"), 0).await.unwrap_err();
        assert!(matches!(err, ConversionError::InvalidInput(_)));
    }
}
