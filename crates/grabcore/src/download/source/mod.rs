//! Extraction collaborators.
//!
//! Strategies talk to the outside world through two traits:
//! - [`InstagramProvider`]: the authenticated primary Instagram fetcher
//! - [`UrlDownloader`]: a generic URL downloader (yt-dlp)
//!
//! Implementations translate raw tool output into closed error enums
//! ([`PrimaryError`], [`ToolFailure`]) so strategies never inspect strings.

pub mod instaloader;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use super::ytdlp_errors::YtDlpErrorType;

pub use instaloader::InstaloaderClient;

/// Metadata returned by a successful primary fetch. Media files are left in
/// the target directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimaryPost {
    pub caption: Option<String>,
    pub owner: Option<String>,
}

/// What the primary extractor signalled when a connection-level error
/// happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// Instagram asked us to slow down
    RateLimited,
    /// The stored session is no longer accepted
    AuthExpired,
    /// Looks like a blip; another extractor may succeed
    Transient,
    Other,
}

/// Failures of the primary Instagram extractor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PrimaryError {
    #[error("login required: {0}")]
    LoginRequired(String),

    #[error("profile does not exist: {0}")]
    ProfileNotExists(String),

    #[error("post not found: {0}")]
    NotFound(String),

    /// Malformed or blocked server response
    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("connection error: {message}")]
    Connection { message: String, signal: ConnectionSignal },

    /// Anything else; `transient` is set when the output carried a token
    /// that usually means a temporary API hiccup
    #[error("{message}")]
    Other { message: String, transient: bool },
}

/// Primary Instagram extractor.
///
/// Methods take `&mut self`: implementations may keep per-login state
/// (session files, directory patterns) that must not be touched by two
/// jobs at once. Share it as a [`SharedProvider`].
#[async_trait]
pub trait InstagramProvider: Send {
    fn name(&self) -> &'static str;

    /// Downloads all media of the post `shortcode` into `target_dir`.
    async fn fetch_post(&mut self, shortcode: &str, target_dir: &Path) -> Result<PrimaryPost, PrimaryError>;

    /// Drops the stored session so the next fetch logs in again.
    async fn invalidate_session(&mut self);
}

/// One provider instance, locked for the duration of one extraction.
pub type SharedProvider = Arc<Mutex<Box<dyn InstagramProvider>>>;

pub fn shared_provider(provider: impl InstagramProvider + 'static) -> SharedProvider {
    Arc::new(Mutex::new(Box::new(provider)))
}

/// Request for a [`UrlDownloader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlDownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    /// yt-dlp format selector
    pub format: String,
    pub max_filesize_mb: u64,
    /// Extract the audio track to mp3
    pub extract_audio: bool,
    pub timeout: Duration,
}

impl UrlDownloadRequest {
    /// Best single file under the cap, merging separate streams if needed.
    pub fn best_under_cap(url: &str, output_dir: &Path, cap_mb: u64, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            output_dir: output_dir.to_path_buf(),
            format: format!(
                "best[filesize<{cap}M]/bestvideo[filesize<{cap}M]+bestaudio/best",
                cap = cap_mb
            ),
            max_filesize_mb: cap_mb,
            extract_audio: false,
            timeout,
        }
    }

    /// Audio track only, converted to mp3.
    pub fn audio_only(url: &str, output_dir: &Path, cap_mb: u64, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            output_dir: output_dir.to_path_buf(),
            format: "bestaudio".to_string(),
            max_filesize_mb: cap_mb,
            extract_audio: true,
            timeout,
        }
    }
}

/// Metadata reported by the downloader; files are left in `output_dir`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlDownloadReport {
    pub title: Option<String>,
    pub uploader: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolFailure {
    #[error("{0} is not installed")]
    Unavailable(String),

    #[error("download timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{message}")]
    Failed { kind: YtDlpErrorType, message: String },
}

/// Generic URL downloader.
#[async_trait]
pub trait UrlDownloader: Send + Sync {
    fn name(&self) -> &'static str;

    async fn is_available(&self) -> bool;

    async fn download(&self, request: &UrlDownloadRequest) -> Result<UrlDownloadReport, ToolFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_under_cap_format() {
        let req = UrlDownloadRequest::best_under_cap("u", Path::new("/tmp/x"), 50, Duration::from_secs(1));
        assert_eq!(req.format, "best[filesize<50M]/bestvideo[filesize<50M]+bestaudio/best");
        assert!(!req.extract_audio);
    }

    #[test]
    fn test_audio_only_request() {
        let req = UrlDownloadRequest::audio_only("u", Path::new("/tmp/x"), 50, Duration::from_secs(1));
        assert_eq!(req.format, "bestaudio");
        assert!(req.extract_audio);
        assert_eq!(req.max_filesize_mb, 50);
    }
}
