//! Module for analyzing yt-dlp errors
//!
//! Turns yt-dlp output into an error category. This is the only place where
//! yt-dlp's free text is inspected.

/// yt-dlp error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YtDlpErrorType {
    /// The download hit `--max-filesize`
    FileTooLarge,
    /// Login, age gate, private or flagged content
    Restricted,
    /// The platform detected automated access
    BotDetection,
    /// Deleted or never existed
    NotFound,
    /// Network problems (timeouts, connection)
    NetworkError,
    /// Unknown error
    Unknown,
}

impl YtDlpErrorType {
    /// Network blips are worth an automatic retry; nothing else is.
    pub fn is_transient(&self) -> bool {
        matches!(self, YtDlpErrorType::NetworkError)
    }
}

/// Analyzes yt-dlp output and determines the error type
///
/// # Parameters
/// - `output`: stderr (optionally joined with stdout) from yt-dlp
///
/// # Returns
/// - `YtDlpErrorType`: the detected error category
pub fn analyze_ytdlp_error(output: &str) -> YtDlpErrorType {
    let lower = output.to_lowercase();

    // Size constraint first: yt-dlp prints it even when exiting cleanly
    if lower.contains("max-filesize") {
        return YtDlpErrorType::FileTooLarge;
    }

    if lower.contains("inappropriate")
        || lower.contains("age-restricted")
        || lower.contains("age restricted")
        || lower.contains("confirm your age")
        || lower.contains("login required")
        || lower.contains("requires login")
        || lower.contains("log in")
        || lower.contains("login")
        || lower.contains("private")
        || lower.contains("restricted")
        || lower.contains("unavailable for")
        || lower.contains("content is unavailable")
        || lower.contains("not available in your country")
    {
        return YtDlpErrorType::Restricted;
    }

    if lower.contains("sign in to confirm you're not a bot")
        || lower.contains("bot detection")
        || lower.contains("http error 403")
    {
        return YtDlpErrorType::BotDetection;
    }

    if lower.contains("video unavailable")
        || lower.contains("has been removed")
        || lower.contains("does not exist")
        || lower.contains("http error 404")
        || lower.contains("not found")
    {
        return YtDlpErrorType::NotFound;
    }

    if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection")
        || lower.contains("network")
        || lower.contains("socket")
        || lower.contains("temporary failure in name resolution")
        || lower.contains("failed to connect")
    {
        return YtDlpErrorType::NetworkError;
    }

    YtDlpErrorType::Unknown
}

/// The most informative line of yt-dlp output for display: the last
/// `ERROR:` line, else the last non-empty line.
pub fn extract_error_line(output: &str) -> String {
    let lines: Vec<&str> = output.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_default()
}
