//! Primary Instagram extractor backed by the `instaloader` CLI.
//!
//! Runs `instaloader -- -<shortcode>` into the job directory, reusing a
//! session file under `SESSION_DIR` when a username is configured. Output
//! of a failed run is classified by [`classify_instaloader_failure`]; this
//! is the only place where instaloader's free text is inspected.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{ConnectionSignal, InstagramProvider, PrimaryError, PrimaryPost};
use crate::core::config;
use crate::core::process::{combined_output, run_with_stdin, run_with_timeout, ProcessError};

/// Tokens that usually mean a temporary API hiccup rather than a real
/// problem with the post.
const TRANSIENT_TOKENS: &[&str] = &["metadata", "401", "403", "429", "json", "query"];

pub struct InstaloaderClient {
    bin: String,
    username: Option<String>,
    password: Option<SecretString>,
    session_dir: PathBuf,
    timeout: Duration,
}

impl InstaloaderClient {
    pub fn new(
        bin: impl Into<String>,
        username: Option<String>,
        password: Option<SecretString>,
        session_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            bin: bin.into(),
            username,
            password,
            session_dir: session_dir.into(),
            timeout,
        }
    }

    /// Client configured from `INSTALOADER_BIN`, `IG_USERNAME`, `IG_PASSWORD`
    /// and `SESSION_DIR`.
    pub fn from_env() -> Self {
        Self::new(
            config::INSTALOADER_BIN.as_str(),
            config::IG_USERNAME.clone(),
            config::IG_PASSWORD.clone(),
            config::SESSION_DIR.clone(),
            config::download::instaloader_timeout(),
        )
    }

    /// `<session_dir>/session-<username>`, if a username is configured.
    pub fn session_file(&self) -> Option<PathBuf> {
        self.username
            .as_ref()
            .map(|user| self.session_dir.join(format!("session-{}", user)))
    }

    /// Fetches run logged in only through an existing session file; the
    /// password never appears on the command line.
    fn add_login_args(&self, cmd: &mut Command) {
        let (Some(user), Some(session)) = (self.username.as_ref(), self.session_file()) else {
            return;
        };
        if session.exists() {
            cmd.arg("--login").arg(user).arg("--sessionfile").arg(&session);
        }
    }

    fn needs_login(&self) -> bool {
        self.password.is_some() && self.session_file().is_some_and(|s| !s.exists())
    }

    fn fetch_command(&self, shortcode: &str, target_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args([
            "--quiet",
            "--no-video-thumbnails",
            "--no-compress-json",
            "--no-profile-pic",
        ])
        .arg("--dirname-pattern")
        .arg(target_dir);
        self.add_login_args(&mut cmd);
        cmd.arg("--").arg(format!("-{}", shortcode));
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd
    }

    /// Logs in once and writes the session file.
    ///
    /// With `interactive` the terminal is inherited so instaloader can ask
    /// for the password or a 2FA code itself. Otherwise `IG_PASSWORD` is
    /// written to instaloader's password prompt over stdin.
    pub async fn login(&self, interactive: bool) -> Result<PathBuf, PrimaryError> {
        let (Some(user), Some(session)) = (self.username.as_ref(), self.session_file()) else {
            return Err(PrimaryError::Other {
                message: "IG_USERNAME is not set".to_string(),
                transient: false,
            });
        };
        if let Some(parent) = session.parent() {
            fs_err::create_dir_all(parent).map_err(|e| PrimaryError::Other {
                message: e.to_string(),
                transient: false,
            })?;
        }

        let mut cmd = Command::new(&self.bin);
        cmd.arg("--login").arg(user).arg("--sessionfile").arg(&session);

        let status = if interactive {
            cmd.kill_on_drop(true)
                .status()
                .await
                .map_err(|e| PrimaryError::Other {
                    message: format!("failed to run {}: {}", self.bin, e),
                    transient: false,
                })?
        } else {
            let Some(password) = &self.password else {
                return Err(PrimaryError::LoginRequired(
                    "IG_PASSWORD is not set; run create-session --interactive".to_string(),
                ));
            };
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            let input = format!("{}\n", password.expose_secret());
            let output = run_with_stdin(&mut cmd, input.as_bytes(), self.timeout)
                .await
                .map_err(|e| process_failure(&e))?;
            if !output.status.success() {
                return Err(classify_instaloader_failure(&combined_output(&output)));
            }
            output.status
        };

        if !status.success() || !session.exists() {
            return Err(PrimaryError::LoginRequired(format!(
                "instaloader did not write {}",
                session.display()
            )));
        }
        log::info!("🔑 Instagram session saved to {}", session.display());
        Ok(session)
    }
}

fn process_failure(err: &ProcessError) -> PrimaryError {
    match err {
        ProcessError::Timeout { .. } => PrimaryError::Connection {
            message: err.to_string(),
            signal: ConnectionSignal::Transient,
        },
        // A missing instaloader should not block the fallback extractor
        ProcessError::Spawn { .. } => PrimaryError::Other {
            message: err.to_string(),
            transient: true,
        },
    }
}

/// Maps instaloader output of a failed run onto [`PrimaryError`].
pub fn classify_instaloader_failure(output: &str) -> PrimaryError {
    let lower = output.to_lowercase();
    let message = summary_line(output);

    if lower.contains("please wait a few minutes") || lower.contains("too many queries") || lower.contains("rate limit")
    {
        return PrimaryError::Connection {
            message,
            signal: ConnectionSignal::RateLimited,
        };
    }

    if lower.contains("checkpoint")
        || lower.contains("challenge_required")
        || lower.contains("login_required")
        || lower.contains("session expired")
        || (lower.contains("session file") && lower.contains("invalid"))
    {
        return PrimaryError::Connection {
            message,
            signal: ConnectionSignal::AuthExpired,
        };
    }

    if lower.contains("does not exist") {
        return PrimaryError::ProfileNotExists(message);
    }

    if lower.contains("private") || lower.contains("login required") || lower.contains("loginrequired") {
        return PrimaryError::LoginRequired(message);
    }

    if lower.contains("404") || lower.contains("not found") {
        return PrimaryError::NotFound(message);
    }

    if lower.contains("bad response") || lower.contains("unexpected response") {
        return PrimaryError::BadResponse(message);
    }

    if lower.contains("connection") || lower.contains("timed out") || lower.contains("name resolution") {
        return PrimaryError::Connection {
            message,
            signal: ConnectionSignal::Transient,
        };
    }

    let transient = TRANSIENT_TOKENS.iter().any(|t| lower.contains(t));
    PrimaryError::Other { message, transient }
}

/// Last non-empty output line, which is where instaloader puts the reason.
fn summary_line(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .unwrap_or("instaloader failed without output")
        .to_string()
}

/// Reads caption and owner from the metadata instaloader writes next to
/// the media (`<date>_UTC.json`, plain-text `<date>_UTC.txt` as fallback).
fn read_post_metadata(dir: &Path) -> PrimaryPost {
    let mut post = PrimaryPost::default();
    let Ok(entries) = fs_err::read_dir(dir) else {
        return post;
    };
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();

    for path in &paths {
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Ok(text) = fs_err::read_to_string(path) else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
            continue;
        };
        let node = value.get("node").unwrap_or(&value);
        post.caption = node
            .pointer("/edge_media_to_caption/edges/0/node/text")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        post.owner = node
            .pointer("/owner/username")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        break;
    }

    if post.caption.is_none() {
        post.caption = paths
            .iter()
            .find(|p| p.extension().and_then(|e| e.to_str()) == Some("txt"))
            .and_then(|p| fs_err::read_to_string(p).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
    }
    post
}

#[async_trait]
impl InstagramProvider for InstaloaderClient {
    fn name(&self) -> &'static str {
        "instaloader"
    }

    async fn fetch_post(&mut self, shortcode: &str, target_dir: &Path) -> Result<PrimaryPost, PrimaryError> {
        if !lazy_regex::regex_is_match!(r"^[A-Za-z0-9_-]+$", shortcode) {
            return Err(PrimaryError::NotFound(format!("invalid shortcode {:?}", shortcode)));
        }

        if self.needs_login() {
            self.login(false).await?;
        }

        log::info!("📥 instaloader: fetching post {}", shortcode);
        let mut cmd = self.fetch_command(shortcode, target_dir);
        let output = run_with_timeout(&mut cmd, self.timeout)
            .await
            .map_err(|e| process_failure(&e))?;

        if !output.status.success() {
            let text = combined_output(&output);
            log::warn!("instaloader failed for {}: {}", shortcode, summary_line(&text));
            return Err(classify_instaloader_failure(&text));
        }

        Ok(read_post_metadata(target_dir))
    }

    async fn invalidate_session(&mut self) {
        let Some(session) = self.session_file() else {
            return;
        };
        match fs_err::remove_file(&session) {
            Ok(()) => log::warn!("🔑 Removed expired Instagram session {}", session.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::error!("Failed to remove session file: {}", e),
        }
    }
}
