//! YouTube extraction strategy.
//!
//! One yt-dlp run for the best format under the cap. When the video cannot
//! fit, the audio track is fetched instead and tagged "video too large".

use std::sync::Arc;
use std::time::Duration;

use super::error::{ExtractionFailure, FailureKind};
use super::job::DownloadJob;
use super::outcome::{largest_media, ExtractedMedia, ExtractionOutcome, MediaItem, MediaKind, Strategy};
use super::source::{ToolFailure, UrlDownloadReport, UrlDownloadRequest, UrlDownloader};
use super::ytdlp_errors::YtDlpErrorType;
use crate::core::config::Settings;
use crate::core::utils::take_chars;

pub const AUDIO_FALLBACK_NOTE: &str = "video too large";

const INSTALL_HINT: &str = "yt-dlp is not installed. Install it with: pip install -U yt-dlp";

pub struct YouTubeStrategy {
    downloader: Arc<dyn UrlDownloader>,
    cap_bytes: u64,
    timeout: Duration,
}

impl YouTubeStrategy {
    pub fn new(downloader: Arc<dyn UrlDownloader>, settings: &Settings) -> Self {
        Self {
            downloader,
            cap_bytes: settings.transport_cap_bytes,
            timeout: settings.ytdlp_timeout,
        }
    }

    fn cap_mb(&self) -> u64 {
        self.cap_bytes / (1024 * 1024)
    }

    pub async fn download(&self, url: &str, job: &DownloadJob) -> ExtractionOutcome {
        if !self.downloader.is_available().await {
            return Err(ExtractionFailure::new(FailureKind::ToolUnavailable, INSTALL_HINT));
        }

        log::info!("🎬 YouTube download {} (job {})", url, job.id);
        let request = UrlDownloadRequest::best_under_cap(url, &job.work_dir, self.cap_mb(), self.timeout);

        match self.downloader.download(&request).await {
            Ok(report) => match largest(job)? {
                Some(item) if item.size <= self.cap_bytes => Ok(ExtractedMedia {
                    caption: report.title.unwrap_or_default(),
                    author: report.uploader,
                    items: vec![item],
                    strategy: Strategy::Primary,
                    note: None,
                }),
                Some(item) => {
                    log::warn!(
                        "Best format is {} bytes, over the {} byte cap; switching to audio",
                        item.size,
                        self.cap_bytes
                    );
                    self.audio_fallback(url, job).await
                }
                None => Err(ExtractionFailure::new(
                    FailureKind::ToolError,
                    "Download failed: no file was created.",
                )),
            },
            Err(ToolFailure::Failed {
                kind: YtDlpErrorType::FileTooLarge,
                ..
            }) => {
                log::warn!("Video exceeds the size cap; switching to audio");
                self.audio_fallback(url, job).await
            }
            Err(failure) => Err(tool_failure(failure)),
        }
    }

    async fn audio_fallback(&self, url: &str, job: &DownloadJob) -> ExtractionOutcome {
        job.reset_dir()
            .map_err(|e| ExtractionFailure::io("Failed to reset work dir", &e))?;

        let request = UrlDownloadRequest::audio_only(url, &job.work_dir, self.cap_mb(), self.timeout);
        let report = self.downloader.download(&request).await.map_err(tool_failure)?;

        match largest(job)? {
            Some(item) if item.kind == MediaKind::Audio && item.size <= self.cap_bytes => {
                Ok(audio_result(item, report))
            }
            Some(item) if item.size > self.cap_bytes => Err(ExtractionFailure::new(
                FailureKind::ToolError,
                "Even the audio track is larger than the upload limit.",
            )),
            Some(item) => Ok(audio_result(item, report)),
            None => Err(ExtractionFailure::new(
                FailureKind::ToolError,
                "Audio download failed: no file was created.",
            )),
        }
    }
}

fn largest(job: &DownloadJob) -> Result<Option<MediaItem>, ExtractionFailure> {
    largest_media(&job.work_dir).map_err(|e| ExtractionFailure::io("Failed to list downloaded files", &e))
}

fn audio_result(item: MediaItem, report: UrlDownloadReport) -> ExtractedMedia {
    ExtractedMedia {
        caption: report.title.unwrap_or_default(),
        author: report.uploader,
        items: vec![item],
        strategy: Strategy::AudioOnly,
        note: Some(AUDIO_FALLBACK_NOTE.to_string()),
    }
}

fn tool_failure(failure: ToolFailure) -> ExtractionFailure {
    match failure {
        ToolFailure::Unavailable(_) => ExtractionFailure::new(FailureKind::ToolUnavailable, INSTALL_HINT),
        ToolFailure::Timeout(d) => ExtractionFailure::new(
            FailureKind::Timeout,
            format!("The download took longer than {} seconds and was stopped.", d.as_secs()),
        ),
        ToolFailure::Failed { kind, message } => {
            let failure = ExtractionFailure::new(FailureKind::ToolError, take_chars(&message, 200));
            if kind.is_transient() {
                failure.transient()
            } else {
                failure
            }
        }
    }
}
