//! Download jobs and their working directories.
//!
//! Every incoming link becomes a [`DownloadJob`] with a fresh id and a
//! directory `<temp_root>/<prefix>_<job id>` that is created once and never
//! reused. [`WorkDirGuard`] removes the directory when dropped, so cleanup
//! happens on every exit path of the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::classify::Platform;

/// `<user id>_<unix seconds>_<6 hex digits of randomness>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(user_id: u64) -> Self {
        let nonce = rand::random::<u32>() & 0x00ff_ffff;
        Self(format!("{}_{}_{:06x}", user_id, Utc::now().timestamp(), nonce))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub id: JobId,
    pub user_id: u64,
    pub platform: Platform,
    pub url: String,
    pub work_dir: PathBuf,
    pub started_at: DateTime<Utc>,
}

impl DownloadJob {
    pub fn new(user_id: u64, platform: Platform, url: impl Into<String>, temp_root: &Path) -> Self {
        let id = JobId::new(user_id);
        let work_dir = temp_root.join(format!("{}_{}", platform.dir_prefix(), id));
        Self {
            id,
            user_id,
            platform,
            url: url.into(),
            work_dir,
            started_at: Utc::now(),
        }
    }

    /// Creates the working directory. Fails if it already exists.
    pub fn create_dir(&self) -> std::io::Result<WorkDirGuard> {
        if let Some(parent) = self.work_dir.parent() {
            fs_err::create_dir_all(parent)?;
        }
        fs_err::create_dir(&self.work_dir)?;
        Ok(WorkDirGuard::new(self.work_dir.clone()))
    }

    /// Empties the working directory before another attempt.
    pub fn reset_dir(&self) -> std::io::Result<()> {
        if self.work_dir.exists() {
            fs_err::remove_dir_all(&self.work_dir)?;
        }
        fs_err::create_dir_all(&self.work_dir)
    }
}

/// Removes a job directory when dropped.
#[derive(Debug)]
pub struct WorkDirGuard {
    path: PathBuf,
    armed: bool,
}

impl WorkDirGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Explicit cleanup with error reporting; the drop is then a no-op.
    pub fn cleanup(mut self) -> std::io::Result<()> {
        self.armed = false;
        remove_if_exists(&self.path)
    }
}

impl Drop for WorkDirGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = remove_if_exists(&self.path) {
                log::warn!("Failed to remove work dir {}: {}", self.path.display(), e);
            }
        }
    }
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs_err::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn is_job_dir(name: &str) -> bool {
    Platform::all_dir_prefixes()
        .iter()
        .any(|prefix| name.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('_')))
}

fn job_dirs(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs_err::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name();
        if entry.file_type()?.is_dir() && is_job_dir(&name.to_string_lossy()) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Deletes job directories under `root` last modified more than `max_age` ago.
/// Returns the removed paths.
pub fn sweep_stale(root: &Path, max_age: Duration) -> std::io::Result<Vec<PathBuf>> {
    let now = SystemTime::now();
    let mut removed = Vec::new();
    for dir in job_dirs(root)? {
        let modified = fs_err::metadata(&dir)?.modified()?;
        let age = now.duration_since(modified).unwrap_or_default();
        if age >= max_age {
            remove_if_exists(&dir)?;
            log::info!("🧹 Removed stale work dir {} ({} min old)", dir.display(), age.as_secs() / 60);
            removed.push(dir);
        }
    }
    Ok(removed)
}

/// Deletes every job directory under `root`, whatever its age.
pub fn sweep_all(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for dir in job_dirs(root)? {
        remove_if_exists(&dir)?;
        removed.push(dir);
    }
    if !removed.is_empty() {
        log::info!("🧹 Removed {} leftover work dir(s) under {}", removed.len(), root.display());
    }
    Ok(removed)
}
