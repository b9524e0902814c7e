//! Size policy: nothing above the transport cap ever leaves this module.

use std::path::{Path, PathBuf};

use super::{get_file_size, ConversionError, Transcoder};
use crate::download::{ExtractionFailure, FailureKind, MediaItem, MediaKind};

/// An item cleared for sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deliverable {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub size: u64,
}

impl Deliverable {
    fn unchanged(item: &MediaItem) -> Self {
        Self {
            path: item.path.clone(),
            kind: item.kind,
            size: item.size,
        }
    }
}

/// `<dir>/<stem>_compressed.mp4` next to the input.
pub fn compressed_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    input.with_file_name(format!("{}_compressed.mp4", stem))
}

fn compression_failed(message: impl Into<String>) -> ExtractionFailure {
    ExtractionFailure::new(FailureKind::CompressionFailed, message)
}

/// Returns `item` unchanged if it fits under `cap_bytes`, otherwise a
/// compressed copy that does. Targets `cap - margin_mb`.
///
/// Only videos are compressed; anything else above the cap, a failed
/// transcode, a missing output or an output still above the cap all yield
/// `CompressionFailed`.
pub async fn ensure_deliverable(
    transcoder: &dyn Transcoder,
    item: &MediaItem,
    cap_bytes: u64,
    margin_mb: u64,
) -> Result<Deliverable, ExtractionFailure> {
    if item.size <= cap_bytes {
        return Ok(Deliverable::unchanged(item));
    }

    if item.kind != MediaKind::Video {
        return Err(compression_failed(format!(
            "{} is larger than the upload limit and cannot be compressed.",
            item.file_name()
        )));
    }

    let cap_mb = cap_bytes / (1024 * 1024);
    let target_mb = cap_mb.saturating_sub(margin_mb).max(1);
    let output = compressed_path(&item.path);

    log::info!(
        "📦 {} is {} bytes (cap {}), compressing to ~{}MB",
        item.file_name(),
        item.size,
        cap_bytes,
        target_mb
    );

    let checked = async {
        transcoder.compress(&item.path, &output, target_mb).await?;
        let size = get_file_size(&output).await?;
        if size > cap_bytes {
            return Err(ConversionError::SizeExceeded {
                actual: size,
                limit: cap_bytes,
            });
        }
        Ok(size)
    }
    .await;

    match checked {
        Ok(size) => Ok(Deliverable {
            path: output,
            kind: MediaKind::Video,
            size,
        }),
        Err(e) => {
            log::warn!("Compression of {} failed: {}", item.file_name(), e);
            Err(compression_failed(format!(
                "The video is too large to send and could not be compressed ({}).",
                e
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::ConversionResult;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes `output_size` bytes to the output, or fails.
    struct StubTranscoder {
        output_size: Option<usize>,
        calls: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl Transcoder for StubTranscoder {
        async fn compress(&self, _input: &Path, output: &Path, target_mb: u64) -> ConversionResult<()> {
            self.calls.lock().unwrap().push(target_mb);
            match self.output_size {
                Some(n) => {
                    std::fs::write(output, vec![0u8; n])?;
                    Ok(())
                }
                None => Err(ConversionError::FfmpegError("encoder exploded".into())),
            }
        }
    }

    fn item(dir: &Path, name: &str, size: u64, kind: MediaKind) -> MediaItem {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        MediaItem { path, kind, size }
    }

    const MB: u64 = 1024 * 1024;

    #[tokio::test]
    async fn test_fitting_item_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let t = StubTranscoder {
            output_size: None,
            calls: Mutex::new(vec![]),
        };
        let it = item(dir.path(), "a.mp4", 10 * MB, MediaKind::Video);
        let d = ensure_deliverable(&t, &it, 50 * MB, 5).await.unwrap();
        assert_eq!(d.path, it.path);
        assert!(t.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_video_is_compressed_next_to_input() {
        let dir = TempDir::new().unwrap();
        let t = StubTranscoder {
            output_size: Some(1000),
            calls: Mutex::new(vec![]),
        };
        let it = item(dir.path(), "clip.mp4", 80 * MB, MediaKind::Video);
        let d = ensure_deliverable(&t, &it, 50 * MB, 5).await.unwrap();
        assert_eq!(d.path, dir.path().join("clip_compressed.mp4"));
        assert_eq!(d.size, 1000);
        assert_eq!(*t.calls.lock().unwrap(), vec![45]);
    }

    #[tokio::test]
    async fn test_output_still_too_large_fails() {
        let dir = TempDir::new().unwrap();
        let t = StubTranscoder {
            output_size: Some(2000),
            calls: Mutex::new(vec![]),
        };
        let it = item(dir.path(), "clip.mp4", 5000, MediaKind::Video);
        let err = ensure_deliverable(&t, &it, 1000, 0).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::CompressionFailed);
    }

    #[tokio::test]
    async fn test_transcoder_error_fails() {
        let dir = TempDir::new().unwrap();
        let t = StubTranscoder {
            output_size: None,
            calls: Mutex::new(vec![]),
        };
        let it = item(dir.path(), "clip.mp4", 80 * MB, MediaKind::Video);
        let err = ensure_deliverable(&t, &it, 50 * MB, 5).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::CompressionFailed);
    }

    #[tokio::test]
    async fn test_oversized_image_is_not_compressed() {
        let dir = TempDir::new().unwrap();
        let t = StubTranscoder {
            output_size: Some(10),
            calls: Mutex::new(vec![]),
        };
        let it = item(dir.path(), "big.jpg", 80 * MB, MediaKind::Image);
        let err = ensure_deliverable(&t, &it, 50 * MB, 5).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::CompressionFailed);
        assert!(t.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_compressed_path() {
        assert_eq!(
            compressed_path(Path::new("/tmp/yt_1/My_Video.webm")),
            PathBuf::from("/tmp/yt_1/My_Video_compressed.mp4")
        );
    }
}
