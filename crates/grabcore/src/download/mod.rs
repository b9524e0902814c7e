pub mod classify;
pub mod error;
pub mod instagram;
pub mod job;
pub mod outcome;
pub mod source;
pub mod youtube;
pub mod ytdlp;
pub mod ytdlp_errors;

// Re-export commonly used types
pub use classify::{classify, extract_url, Platform};
pub use error::{ExtractionFailure, FailureKind};
pub use instagram::InstagramStrategy;
pub use job::{DownloadJob, JobId, WorkDirGuard};
pub use outcome::{ExtractedMedia, ExtractionOutcome, MediaItem, MediaKind, Strategy};
pub use source::{InstagramProvider, SharedProvider, UrlDownloader};
pub use youtube::YouTubeStrategy;
pub use ytdlp::YtDlp;
