//! Logging initialization and configuration checking
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Startup diagnostics (credentials, external tools, directories)

use anyhow::Result;
use secrecy::ExposeSecret;
use simplelog::*;
use std::fs::File;
use std::process::{Command, Stdio};

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

fn binary_runs(bin: &str, version_arg: &str) -> bool {
    Command::new(bin)
        .arg(version_arg)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn status_mark(ok: bool) -> &'static str {
    if ok {
        "✅"
    } else {
        "❌"
    }
}

/// Logs the runtime configuration at application startup
///
/// Reports:
/// - whether a bot token is present (never the token itself)
/// - Instagram credentials (authenticated vs anonymous)
/// - availability of instaloader, yt-dlp, ffmpeg and ffprobe
/// - working directory and state file locations
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🚀 Startup Configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    log::info!(
        "{} Bot token: {}",
        status_mark(!config::BOT_TOKEN.is_empty()),
        if config::BOT_TOKEN.is_empty() { "missing" } else { "set" }
    );

    match config::IG_USERNAME.as_deref() {
        Some(user) => {
            let has_password = config::IG_PASSWORD
                .as_ref()
                .is_some_and(|p| !p.expose_secret().is_empty());
            log::info!("📸 Instagram: authenticated as {} (password {})", user, if has_password { "set" } else { "not set" });
        }
        None => log::warn!("⚠️  Instagram: anonymous (set IG_USERNAME for higher limits)"),
    }

    let tools = [
        ("instaloader", config::INSTALOADER_BIN.as_str(), "--version"),
        ("yt-dlp", config::YTDL_BIN.as_str(), "--version"),
        ("ffmpeg", config::FFMPEG_BIN.as_str(), "-version"),
        ("ffprobe", config::FFPROBE_BIN.as_str(), "-version"),
    ];
    for (name, bin, arg) in tools {
        let ok = binary_runs(bin, arg);
        if ok {
            log::info!("{} {}: {}", status_mark(ok), name, bin);
        } else {
            log::warn!("{} {}: {} (not found)", status_mark(ok), name, bin);
        }
    }

    log::info!("📂 Work dirs: {}", config::TEMP_FILES_DIR.display());
    log::info!("💾 State file: {}", config::STATE_FILE_PATH.display());
    log::info!("🔑 Session dir: {}", config::SESSION_DIR.display());
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
