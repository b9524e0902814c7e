use once_cell::sync::Lazy;
use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::retry::RetryConfig;

// Configuration constants for the bot

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
/// Empty when neither is set; the bot refuses to start in that case
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Instagram account used by instaloader
/// Read from IG_USERNAME environment variable
/// Absent means anonymous access (very low limits)
pub static IG_USERNAME: Lazy<Option<String>> =
    Lazy::new(|| env::var("IG_USERNAME").ok().filter(|s| !s.trim().is_empty()));

/// Instagram password, only needed when no session file exists yet
pub static IG_PASSWORD: Lazy<Option<SecretString>> = Lazy::new(|| {
    env::var("IG_PASSWORD")
        .ok()
        .filter(|s| !s.is_empty())
        .map(SecretString::from)
});

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// instaloader binary path
pub static INSTALOADER_BIN: Lazy<String> =
    Lazy::new(|| env::var("INSTALOADER_BIN").unwrap_or_else(|_| "instaloader".to_string()));

/// ffmpeg binary path
pub static FFMPEG_BIN: Lazy<String> = Lazy::new(|| env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()));

/// ffprobe binary path
pub static FFPROBE_BIN: Lazy<String> =
    Lazy::new(|| env::var("FFPROBE_BIN").unwrap_or_else(|_| "ffprobe".to_string()));

/// Root directory for per-job working directories
/// Read from TEMP_FILES_DIR environment variable
/// Supports tilde (~) expansion for home directory
pub static TEMP_FILES_DIR: Lazy<PathBuf> = Lazy::new(|| {
    let raw = env::var("TEMP_FILES_DIR").unwrap_or_else(|_| "/tmp/telegram_downloader".to_string());
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
});

/// JSON file holding counters and the active-job table
/// Read from STATE_FILE_PATH environment variable
/// Default: bot_state.json
pub static STATE_FILE_PATH: Lazy<PathBuf> = Lazy::new(|| {
    let raw = env::var("STATE_FILE_PATH").unwrap_or_else(|_| "bot_state.json".to_string());
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
});

/// Directory where instaloader session files are kept
pub static SESSION_DIR: Lazy<PathBuf> = Lazy::new(|| {
    let raw = env::var("SESSION_DIR").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
});

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Transport limits of the Bot API
pub mod limits {
    /// Maximum payload accepted for direct media upload (MB)
    pub const TRANSPORT_CAP_MB: u64 = 50;

    /// Headroom kept below the cap when compressing (MB)
    pub const COMPRESSION_MARGIN_MB: u64 = 5;

    /// Post captions are cut to this many characters before display
    pub const CAPTION_MAX_CHARS: usize = 300;

    /// Telegram media caption hard limit
    pub const TELEGRAM_CAPTION_LIMIT: usize = 1024;

    /// Items of a multi-item post sent per job
    pub const MAX_ITEMS_PER_JOB: usize = 10;

    pub const fn transport_cap_bytes() -> u64 {
        TRANSPORT_CAP_MB * 1024 * 1024
    }
}

/// Download configuration
pub mod download {
    use super::Duration;

    /// Timeout for a single yt-dlp invocation (in seconds)
    pub const YTDLP_TIMEOUT_SECS: u64 = 300;

    /// Timeout for a single instaloader invocation (in seconds)
    pub const INSTALOADER_TIMEOUT_SECS: u64 = 180;

    /// Timeout for an ffmpeg compression run (in seconds)
    pub const FFMPEG_TIMEOUT_SECS: u64 = 600;

    pub fn ytdlp_timeout() -> Duration {
        Duration::from_secs(YTDLP_TIMEOUT_SECS)
    }

    pub fn instaloader_timeout() -> Duration {
        Duration::from_secs(INSTALOADER_TIMEOUT_SECS)
    }

    pub fn ffmpeg_timeout() -> Duration {
        Duration::from_secs(FFMPEG_TIMEOUT_SECS)
    }
}

/// Delivery configuration
pub mod delivery {
    use super::Duration;

    /// Pause between consecutive media sends (milliseconds)
    pub const INTER_ITEM_DELAY_MS: u64 = 700;

    pub fn inter_item_delay() -> Duration {
        Duration::from_millis(INTER_ITEM_DELAY_MS)
    }
}

/// Bot API client configuration
pub mod network {
    use super::Duration;

    /// HTTP timeout for Bot API requests; uploads of 50MB need headroom (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 300;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Working-directory cleanup configuration
pub mod cleanup {
    use super::Duration;

    /// `/clean` removes job directories older than this (in seconds)
    pub const STALE_AGE_SECS: u64 = 3600;

    pub fn stale_age() -> Duration {
        Duration::from_secs(STALE_AGE_SECS)
    }
}

/// Retry configuration
pub mod retry {
    use super::Duration;

    /// Extra attempts for a whole download after a transient failure
    pub const DOWNLOAD_MAX_RETRIES: u32 = 2;

    /// Linear backoff step between download attempts (in seconds)
    pub const DOWNLOAD_RETRY_STEP_SECS: u64 = 3;

    pub fn download_step() -> Duration {
        Duration::from_secs(DOWNLOAD_RETRY_STEP_SECS)
    }
}

/// Runtime settings injected into the orchestrator.
///
/// Production code builds this from the statics above; tests override
/// fields (temp root, delays) without touching the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub temp_root: PathBuf,
    pub transport_cap_bytes: u64,
    pub compression_margin_mb: u64,
    pub caption_max_chars: usize,
    pub max_items: usize,
    pub item_delay: Duration,
    pub ytdlp_timeout: Duration,
    pub retry: RetryConfig,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            temp_root: TEMP_FILES_DIR.clone(),
            ..Self::default()
        }
    }

    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = root.into();
        self
    }

    pub fn transport_cap_mb(&self) -> u64 {
        self.transport_cap_bytes / (1024 * 1024)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temp_root: PathBuf::from("/tmp/telegram_downloader"),
            transport_cap_bytes: limits::transport_cap_bytes(),
            compression_margin_mb: limits::COMPRESSION_MARGIN_MB,
            caption_max_chars: limits::CAPTION_MAX_CHARS,
            max_items: limits::MAX_ITEMS_PER_JOB,
            item_delay: delivery::inter_item_delay(),
            ytdlp_timeout: download::ytdlp_timeout(),
            retry: RetryConfig::download(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_cap_is_fifty_megabytes() {
        assert_eq!(limits::transport_cap_bytes(), 52_428_800);
        assert_eq!(Settings::default().transport_cap_mb(), 50);
    }

    #[test]
    fn test_with_temp_root_overrides_only_root() {
        let settings = Settings::default().with_temp_root("/var/tmp/jobs");
        assert_eq!(settings.temp_root, PathBuf::from("/var/tmp/jobs"));
        assert_eq!(settings.max_items, limits::MAX_ITEMS_PER_JOB);
    }
}
