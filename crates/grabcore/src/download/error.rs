use std::fmt;

use crate::core::retry::Retryable;

/// Closed taxonomy of extraction/delivery failures.
///
/// Tool adapters translate raw tool output into one of these; nothing above
/// the adapters looks at error strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No shortcode/identifier could be parsed from the URL
    InvalidUrl,
    /// Post or video deleted / never existed
    NotFound,
    /// Private profile or login required
    Private,
    /// Age-restricted, flagged or otherwise blocked content
    Restricted,
    /// The platform throttles us; retry after a cooldown
    RateLimited,
    /// The stored Instagram session stopped working
    SessionExpired,
    /// A tool exceeded its wall-clock budget and was killed
    Timeout,
    /// The required binary is not installed
    ToolUnavailable,
    /// The tool ran and failed for another reason
    ToolError,
    /// An oversized video could not be brought under the transport cap
    CompressionFailed,
    /// The fallback extractor failed after the primary produced nothing
    FallbackError,
    /// Primary and fallback both failed
    AllMethodsFailed,
    /// Catch-all for uncategorized errors
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidUrl => "invalid_url",
            FailureKind::NotFound => "not_found",
            FailureKind::Private => "private",
            FailureKind::Restricted => "restricted",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::SessionExpired => "session_expired",
            FailureKind::Timeout => "timeout",
            FailureKind::ToolUnavailable => "tool_unavailable",
            FailureKind::ToolError => "tool_error",
            FailureKind::CompressionFailed => "compression_failed",
            FailureKind::FallbackError => "fallback_error",
            FailureKind::AllMethodsFailed => "all_methods_failed",
            FailureKind::Unknown => "unknown",
        }
    }

    /// Whether the user can meaningfully resend the link later.
    pub fn is_user_retryable(&self) -> bool {
        matches!(self, FailureKind::RateLimited | FailureKind::Timeout)
    }

    /// How long the user should wait before resending, if at all.
    pub fn suggested_wait(&self) -> Option<&'static str> {
        match self {
            FailureKind::RateLimited => Some("30-60 minutes"),
            FailureKind::Timeout => Some("a few minutes"),
            _ => None,
        }
    }

    /// Kinds that no amount of retrying will change.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            FailureKind::InvalidUrl | FailureKind::NotFound | FailureKind::Private | FailureKind::Restricted
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified extraction failure, returned as data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailure {
    pub kind: FailureKind,
    /// User-facing explanation (plain text)
    pub message: String,
    /// The user may resend later (see [`FailureKind::suggested_wait`])
    pub retryable: bool,
    /// An adapter saw a transient network condition; the orchestrator may
    /// rerun the whole download automatically
    pub transient: bool,
}

impl ExtractionFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.is_user_retryable(),
            transient: false,
        }
    }

    #[must_use]
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidUrl, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unknown, message)
    }

    /// Wraps a local IO problem (work dir listing, reset) as `Unknown`.
    pub fn io(context: &str, err: &std::io::Error) -> Self {
        log::error!("{}: {}", context, err);
        Self::unknown(format!("{}: {}", context, err))
    }
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ExtractionFailure {}

impl Retryable for ExtractionFailure {
    fn is_retryable(&self) -> bool {
        self.transient && !self.kind.is_permanent()
    }
}
