//! Delivery orchestrator
//!
//! One [`Orchestrator::handle`] call per chat message:
//! `Classifying -> Extracting -> PolicyCheck -> Sending -> Reporting ->
//! CleaningUp`. Extraction failures skip straight to reporting. The job
//! directory is owned by a [`WorkDirGuard`](crate::download::WorkDirGuard)
//! and removed on every exit path.

use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::{format, DeliveryError, IncomingRequest, JobReport, JobStatus, MessageRef, Messenger};
use crate::conversion::{ensure_deliverable, Deliverable, Transcoder};
use crate::core::config::Settings;
use crate::core::retry::retry;
use crate::download::{
    extract_url, DownloadJob, ExtractedMedia, ExtractionFailure, ExtractionOutcome, InstagramStrategy,
    MediaKind, Platform, Strategy, YouTubeStrategy,
};
use crate::storage::{ActiveJob, JobBook};

/// Telegram rejects photos above this size; larger images go as documents.
pub const PHOTO_MAX_BYTES: u64 = 10 * 1024 * 1024;

struct Delivered {
    sent: usize,
    total: usize,
    strategy: Strategy,
}

pub struct Orchestrator {
    instagram: InstagramStrategy,
    youtube: YouTubeStrategy,
    transcoder: Arc<dyn Transcoder>,
    jobs: JobBook,
    settings: Settings,
}

impl Orchestrator {
    pub fn new(
        instagram: InstagramStrategy,
        youtube: YouTubeStrategy,
        transcoder: Arc<dyn Transcoder>,
        jobs: JobBook,
        settings: Settings,
    ) -> Self {
        Self {
            instagram,
            youtube,
            transcoder,
            jobs,
            settings,
        }
    }

    pub fn jobs(&self) -> &JobBook {
        &self.jobs
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Handles one chat message. Returns `None` (and sends nothing) when the
    /// text holds no supported link.
    pub async fn handle(&self, messenger: &dyn Messenger, request: &IncomingRequest) -> Option<JobReport> {
        let (platform, url) = extract_url(&request.text)?;
        let job = DownloadJob::new(request.user_id, platform, url, &self.settings.temp_root);
        log::info!(
            "📥 Job {} from user {}: {} {}",
            job.id,
            job.user_id,
            platform.display_name(),
            job.url
        );

        let status = match messenger.send_text(&format::in_progress(platform)).await {
            Ok(message) => Some(message),
            Err(e) => {
                log::warn!("Failed to send progress message for job {}: {}", job.id, e);
                None
            }
        };

        let active = self.jobs.track(&job);
        let result = match job.create_dir() {
            Ok(guard) => {
                let result = AssertUnwindSafe(self.run(messenger, status, &job))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(panicked(&job, panic.as_ref())));

                self.report(messenger, status, &job, active, &result).await;

                if let Err(e) = guard.cleanup() {
                    log::warn!("Failed to remove work dir of job {}: {}", job.id, e);
                }
                result
            }
            Err(e) => {
                let failure = ExtractionFailure::io("Failed to create work dir", &e);
                let result = Err(failure.clone());
                self.report(messenger, status, &job, active, &result).await;
                Err(failure)
            }
        };

        let status = match result {
            Ok(d) => JobStatus::Delivered {
                sent: d.sent,
                total: d.total,
                strategy: d.strategy,
            },
            Err(f) => JobStatus::Failed(f.kind),
        };
        log::info!("🏁 Job {} finished: {:?}", job.id, status);

        Some(JobReport {
            job_id: job.id,
            platform,
            status,
        })
    }

    async fn run(
        &self,
        messenger: &dyn Messenger,
        status: Option<MessageRef>,
        job: &DownloadJob,
    ) -> Result<Delivered, ExtractionFailure> {
        let media = self.extract(job).await?;
        self.deliver(messenger, status, job, media).await
    }

    /// Runs the platform strategy, rerunning it for transient failures.
    async fn extract(&self, job: &DownloadJob) -> ExtractionOutcome {
        let attempt = retry(&self.settings.retry, || async move {
            job.reset_dir()
                .map_err(|e| ExtractionFailure::io("Failed to prepare work dir", &e))?;
            match job.platform {
                Platform::Instagram => self.instagram.extract(&job.url, job).await,
                Platform::YouTube => self.youtube.download(&job.url, job).await,
            }
        })
        .await;

        if attempt.attempts > 1 {
            log::info!(
                "Job {} extraction took {} attempts ({:.1}s)",
                job.id,
                attempt.attempts,
                attempt.total_duration.as_secs_f64()
            );
        }
        attempt.into_result()
    }

    async fn deliver(
        &self,
        messenger: &dyn Messenger,
        status: Option<MessageRef>,
        job: &DownloadJob,
        media: ExtractedMedia,
    ) -> Result<Delivered, ExtractionFailure> {
        if let Some(message) = status {
            if let Err(e) = messenger.edit_text(message, format::sending()).await {
                log::warn!("Failed to update progress message: {}", e);
            }
        }

        if job.platform == Platform::Instagram {
            if let Err(e) = messenger.send_text(&format::instagram_info(&media)).await {
                log::warn!("Failed to send post info for job {}: {}", job.id, e);
            }
        }

        if media.items.len() > self.settings.max_items {
            log::info!(
                "Job {} has {} items, sending the first {}",
                job.id,
                media.items.len(),
                self.settings.max_items
            );
        }
        let items = &media.items[..media.items.len().min(self.settings.max_items)];
        let total = items.len();
        let mut sent = 0;
        let mut first_failure = None;

        for (index, item) in items.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.settings.item_delay).await;
            }

            let deliverable = match ensure_deliverable(
                self.transcoder.as_ref(),
                item,
                self.settings.transport_cap_bytes,
                self.settings.compression_margin_mb,
            )
            .await
            {
                Ok(d) => d,
                Err(failure) => {
                    notify_item_failure(messenger, index + 1, total, &failure.message).await;
                    first_failure.get_or_insert(failure);
                    continue;
                }
            };

            let caption = match job.platform {
                Platform::YouTube => Some(format::youtube_caption(&media, deliverable.size)),
                Platform::Instagram => None,
            };

            log::info!("📤 Job {}: sending {}/{} {}", job.id, index + 1, total, item.file_name());
            match send_item(messenger, &deliverable, caption.as_deref()).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    log::warn!("Failed to send {} for job {}: {}", item.file_name(), job.id, e);
                    notify_item_failure(messenger, index + 1, total, &e.to_string()).await;
                    first_failure.get_or_insert(ExtractionFailure::unknown(e.to_string()));
                }
            }
        }

        if sent == 0 {
            return Err(first_failure.unwrap_or_else(|| ExtractionFailure::unknown("Nothing could be sent.")));
        }
        Ok(Delivered {
            sent,
            total,
            strategy: media.strategy,
        })
    }

    /// Final chat update plus bookkeeping.
    async fn report(
        &self,
        messenger: &dyn Messenger,
        status: Option<MessageRef>,
        job: &DownloadJob,
        active: ActiveJob<'_>,
        result: &Result<Delivered, ExtractionFailure>,
    ) {
        let text = match result {
            Ok(d) => format::delivered(d.sent, d.total),
            Err(failure) => {
                log::warn!("❌ Job {} failed: {}", job.id, failure);
                format::failure(failure)
            }
        };

        let shown = match status {
            Some(message) => messenger.edit_text(message, &text).await,
            None => messenger.send_text(&text).await.map(|_| ()),
        };
        if let Err(e) = shown {
            log::warn!("Failed to report result of job {}: {}", job.id, e);
        }

        match active.finish(result.is_ok()) {
            Ok(state) => log::debug!(
                "Totals: {} completed, {} failed",
                state.downloads_completed,
                state.downloads_failed
            ),
            Err(e) => log::warn!("Failed to record result of job {}: {}", job.id, e),
        }
    }
}

fn panicked(job: &DownloadJob, panic: &(dyn Any + Send)) -> ExtractionFailure {
    let detail = panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    log::error!("💥 Job {} panicked: {}", job.id, detail);
    ExtractionFailure::unknown("Internal error while processing the link.")
}

async fn notify_item_failure(messenger: &dyn Messenger, index: usize, total: usize, reason: &str) {
    if let Err(e) = messenger.send_text(&format::item_failed(index, total, reason)).await {
        log::warn!("Failed to report item failure: {}", e);
    }
}

async fn send_item(
    messenger: &dyn Messenger,
    item: &Deliverable,
    caption: Option<&str>,
) -> Result<(), DeliveryError> {
    match item.kind {
        MediaKind::Image if item.size > PHOTO_MAX_BYTES => messenger.send_document(&item.path, caption).await,
        MediaKind::Image => messenger.send_photo(&item.path, caption).await,
        MediaKind::Video => messenger.send_video(&item.path, caption).await,
        MediaKind::Audio => messenger.send_audio(&item.path, caption).await,
    }
}

