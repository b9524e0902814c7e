//! Instagram extraction strategy.
//!
//! Primary extractor first (authenticated instaloader), generic URL
//! downloader as fallback. Primary failures are mapped onto the failure
//! taxonomy: some end the job, the rest route to the fallback.

use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::error::{ExtractionFailure, FailureKind};
use super::job::DownloadJob;
use super::outcome::{collect_media, ExtractedMedia, ExtractionOutcome, MediaItem, Strategy, INSTAGRAM_MEDIA_EXTENSIONS};
use super::source::{
    ConnectionSignal, PrimaryError, PrimaryPost, SharedProvider, ToolFailure, UrlDownloadRequest, UrlDownloader,
};
use super::ytdlp_errors::YtDlpErrorType;
use crate::core::config::Settings;
use crate::core::utils::{take_chars, truncate_string_safe};

const CONTENT_TYPES: &[&str] = &["p", "reel", "reels", "tv"];

const LIKELY_CAUSES: &str = "The post may be private, deleted, or blocked in this region.";

/// Parses the post shortcode out of an Instagram URL.
///
/// Supports `/p/<code>/`, `/reel/<code>/`, `/reels/<code>/`, `/tv/<code>/`,
/// the same with a leading `/<username>/`, `/share/<kind>/<code>/` and
/// `instagr.am/p/<code>/`.
pub fn parse_shortcode(url: &str) -> Option<String> {
    let url = if url.contains("://") {
        Url::parse(url).ok()?
    } else {
        Url::parse(&format!("https://{}", url)).ok()?
    };
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

    let code = match segments.as_slice() {
        [kind, code, ..] if CONTENT_TYPES.contains(kind) => *code,
        ["share", kind, code, ..] if CONTENT_TYPES.contains(kind) => *code,
        ["share", code, ..] => *code,
        [_user, kind, code, ..] if CONTENT_TYPES.contains(kind) => *code,
        _ => return None,
    };

    lazy_regex::regex_is_match!(r"^[A-Za-z0-9_-]+$", code).then(|| code.to_string())
}

/// Why the fallback runs; decides how its failure is reported.
#[derive(Debug)]
enum FallbackReason {
    /// The primary ran cleanly but produced no usable file
    NoUsableFiles,
    /// The primary failed with an error that is worth a second opinion
    PrimaryFailed(String),
}

enum PrimaryDecision {
    Fail(ExtractionFailure),
    Fallback(String),
}

pub struct InstagramStrategy {
    primary: SharedProvider,
    fallback: Arc<dyn UrlDownloader>,
    cap_bytes: u64,
    timeout: Duration,
    caption_max: usize,
}

impl InstagramStrategy {
    pub fn new(primary: SharedProvider, fallback: Arc<dyn UrlDownloader>, settings: &Settings) -> Self {
        Self {
            primary,
            fallback,
            cap_bytes: settings.transport_cap_bytes,
            timeout: settings.ytdlp_timeout,
            caption_max: settings.caption_max_chars,
        }
    }

    fn cap_mb(&self) -> u64 {
        self.cap_bytes / (1024 * 1024)
    }

    pub async fn extract(&self, url: &str, job: &DownloadJob) -> ExtractionOutcome {
        let shortcode = parse_shortcode(url)
            .ok_or_else(|| ExtractionFailure::invalid_url("Could not find a post code in this link."))?;

        let primary_result = {
            let mut provider = self.primary.lock().await;
            log::info!("📸 {} → {} (job {})", provider.name(), shortcode, job.id);
            let result = provider.fetch_post(&shortcode, &job.work_dir).await;
            if let Err(PrimaryError::Connection {
                signal: ConnectionSignal::AuthExpired,
                ..
            }) = &result
            {
                provider.invalidate_session().await;
            }
            result
        };

        let reason = match primary_result {
            Ok(post) => {
                let items = self.usable_files(job)?;
                if !items.is_empty() {
                    log::info!("✅ Primary extractor produced {} file(s)", items.len());
                    return Ok(self.finish(items, post, Strategy::Primary));
                }
                log::warn!("Primary extractor returned no usable files for {}", shortcode);
                FallbackReason::NoUsableFiles
            }
            Err(err) => match map_primary_error(err) {
                PrimaryDecision::Fail(failure) => return Err(failure),
                PrimaryDecision::Fallback(message) => FallbackReason::PrimaryFailed(message),
            },
        };

        self.run_fallback(url, job, reason).await
    }

    fn usable_files(&self, job: &DownloadJob) -> Result<Vec<MediaItem>, ExtractionFailure> {
        collect_media(&job.work_dir, self.cap_bytes, INSTAGRAM_MEDIA_EXTENSIONS)
            .map_err(|e| ExtractionFailure::io("Failed to list downloaded files", &e))
    }

    async fn run_fallback(&self, url: &str, job: &DownloadJob, reason: FallbackReason) -> ExtractionOutcome {
        log::info!("⚠️ Trying {} fallback ({:?})", self.fallback.name(), reason);
        job.reset_dir()
            .map_err(|e| ExtractionFailure::io("Failed to reset work dir", &e))?;

        let request = UrlDownloadRequest::best_under_cap(url, &job.work_dir, self.cap_mb(), self.timeout);
        let report = match self.fallback.download(&request).await {
            Ok(report) => report,
            Err(failure) => return Err(fallback_failure(failure, &reason)),
        };

        let items = self.usable_files(job)?;
        if items.is_empty() {
            return Err(combined_failure(&reason, "No media files found after download.".to_string()));
        }

        let post = PrimaryPost {
            caption: report.title,
            owner: report.uploader,
        };
        Ok(self.finish(items, post, Strategy::Fallback))
    }

    fn finish(&self, items: Vec<MediaItem>, post: PrimaryPost, strategy: Strategy) -> ExtractedMedia {
        ExtractedMedia {
            items,
            caption: truncate_string_safe(post.caption.as_deref().unwrap_or_default().trim(), self.caption_max),
            author: post.owner.filter(|o| !o.is_empty()),
            strategy,
            note: None,
        }
    }
}

fn map_primary_error(err: PrimaryError) -> PrimaryDecision {
    use PrimaryDecision::{Fail, Fallback};

    match err {
        PrimaryError::LoginRequired(_) => Fail(ExtractionFailure::new(
            FailureKind::Private,
            "Login required: this post is probably from a private account.",
        )),
        PrimaryError::ProfileNotExists(_) => Fail(ExtractionFailure::new(
            FailureKind::Private,
            "Profile not found or private.",
        )),
        PrimaryError::NotFound(_) => Fail(ExtractionFailure::new(
            FailureKind::NotFound,
            "Post not found (deleted or private).",
        )),
        PrimaryError::BadResponse(message) => Fallback(message),
        PrimaryError::Connection { message, signal } => match signal {
            ConnectionSignal::RateLimited => Fail(ExtractionFailure::new(
                FailureKind::RateLimited,
                "⛔ Instagram rate limit: too many requests.",
            )),
            ConnectionSignal::AuthExpired => Fail(ExtractionFailure::new(
                FailureKind::SessionExpired,
                "The Instagram session expired. It has been reset; please send the link again.",
            )),
            ConnectionSignal::Transient => Fallback(message),
            ConnectionSignal::Other => Fail(ExtractionFailure::unknown(format!(
                "Connection error: {}",
                take_chars(&message, 200)
            ))),
        },
        PrimaryError::Other { message, transient } => {
            if transient {
                Fallback(message)
            } else {
                Fail(ExtractionFailure::unknown(format!("Error: {}", take_chars(&message, 200))))
            }
        }
    }
}

fn combined_failure(reason: &FallbackReason, detail: String) -> ExtractionFailure {
    match reason {
        FallbackReason::PrimaryFailed(primary) => {
            log::warn!("Both extractors failed. Primary: {}; fallback: {}", primary, detail);
            ExtractionFailure::new(
                FailureKind::AllMethodsFailed,
                format!("Every download method failed.\n\n{}", LIKELY_CAUSES),
            )
        }
        FallbackReason::NoUsableFiles => ExtractionFailure::new(
            FailureKind::FallbackError,
            format!("Download failed: {}\n\n{}", take_chars(&detail, 100), LIKELY_CAUSES),
        ),
    }
}

fn fallback_failure(failure: ToolFailure, reason: &FallbackReason) -> ExtractionFailure {
    match failure {
        ToolFailure::Failed {
            kind: YtDlpErrorType::Restricted,
            ..
        } => ExtractionFailure::new(
            FailureKind::Restricted,
            "This post is age-restricted, private or flagged by Instagram and cannot be downloaded.",
        ),
        ToolFailure::Timeout(d) => ExtractionFailure::new(
            FailureKind::Timeout,
            format!("The download took longer than {} seconds.", d.as_secs()),
        ),
        ToolFailure::Failed { kind, message } => {
            let failure = combined_failure(reason, message);
            if kind.is_transient() {
                failure.transient()
            } else {
                failure
            }
        }
        ToolFailure::Unavailable(bin) => combined_failure(reason, format!("{} is not installed", bin)),
    }
}
