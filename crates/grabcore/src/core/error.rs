use thiserror::Error;

use crate::conversion::ConversionError;
use crate::core::process::ProcessError;

/// Centralized error types for the application
///
/// Extraction failures are *not* part of this enum: they are returned as
/// data (`download::ExtractionFailure`) so the orchestrator can phrase them
/// for the chat. `AppError` covers the plumbing around them: state file,
/// working directories, configuration and the Telegram transport.
///
/// # Example
///
/// ```no_run
/// use grabcore::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// State file (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// External process errors (spawn failure, timeout)
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// ffmpeg / ffprobe errors
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Telegram API errors
    #[cfg(feature = "telegram")]
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, AppError::Io(_)));
        assert_eq!(err.to_string(), "IO error: gone");
    }

    #[test]
    fn test_config_error_display() {
        let err = AppError::Config("BOT_TOKEN is not set".to_string());
        assert_eq!(err.to_string(), "Configuration error: BOT_TOKEN is not set");
    }
}
