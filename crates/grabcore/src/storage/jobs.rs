//! Job lifecycle bookkeeping on top of a [`StatsStore`]

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::{ActiveDownload, BotAggregateState, StatsStore, UserStats};
use crate::core::error::AppResult;
use crate::download::job::{self, DownloadJob, JobId};

#[derive(Clone)]
pub struct JobBook {
    store: Arc<dyn StatsStore>,
}

impl JobBook {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self { store }
    }

    pub fn snapshot(&self) -> BotAggregateState {
        self.store.snapshot()
    }

    pub fn user_stats(&self, user_id: u64) -> UserStats {
        self.store.snapshot().user(user_id)
    }

    /// Records `job` as active.
    pub fn begin(&self, job: &DownloadJob) -> AppResult<()> {
        let entry = ActiveDownload {
            platform: job.platform,
            url: job.url.clone(),
            work_dir: job.work_dir.clone(),
            started_at: job.started_at,
        };
        let key = job.id.to_string();
        self.store.update(&mut |state| {
            state.active_downloads.insert(key.clone(), entry.clone());
        })?;
        Ok(())
    }

    /// Records `job` as active and returns a handle that must be finished.
    /// A handle dropped unfinished (panic, cancelled task) counts the job
    /// as failed.
    pub fn track<'a>(&'a self, job: &'a DownloadJob) -> ActiveJob<'a> {
        if let Err(e) = self.begin(job) {
            log::warn!("Failed to record job {} as active: {}", job.id, e);
        }
        ActiveJob {
            book: self,
            job,
            open: true,
        }
    }

    /// Removes `job` from the active table and counts it.
    pub fn finish(&self, job: &DownloadJob, success: bool) -> AppResult<BotAggregateState> {
        let key = job.id.to_string();
        let user = job.user_id.to_string();
        self.store.update(&mut |state| {
            state.active_downloads.remove(&key);
            if success {
                state.downloads_completed += 1;
            } else {
                state.downloads_failed += 1;
            }
            let stats = state.user_stats.entry(user.clone()).or_default();
            stats.total += 1;
            if success {
                stats.success += 1;
            }
        })
    }

    /// Startup recovery: jobs still listed as active were cut off by a crash
    /// or restart. Their work dirs are deleted, the table is cleared and
    /// `last_restart` is stamped. Returns the recovered ids.
    ///
    /// Only directories under `temp_root` are touched.
    pub fn recover_crashed(&self, temp_root: &Path) -> AppResult<Vec<JobId>> {
        let active = self.store.snapshot().active_downloads;

        for (id, entry) in &active {
            if !entry.work_dir.starts_with(temp_root) {
                log::warn!(
                    "Skipping work dir of job {} outside {}: {}",
                    id,
                    temp_root.display(),
                    entry.work_dir.display()
                );
                continue;
            }
            match fs_err::remove_dir_all(&entry.work_dir) {
                Ok(()) => log::info!("🧹 Removed work dir of interrupted job {}", id),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove work dir of job {}: {}", id, e),
            }
        }

        self.store.update(&mut |state| {
            state.active_downloads.clear();
            state.last_restart = Some(Utc::now());
        })?;

        if !active.is_empty() {
            log::warn!("♻️ Recovered {} interrupted job(s)", active.len());
        }
        Ok(active.into_keys().map(JobId::from).collect())
    }

    /// `/clean`: removes job dirs older than `max_age`.
    pub fn sweep_stale(&self, temp_root: &Path, max_age: Duration) -> AppResult<Vec<PathBuf>> {
        Ok(job::sweep_stale(temp_root, max_age)?)
    }

    /// Shutdown and `mediagrab sweep`: removes every job dir.
    pub fn sweep_all(&self, temp_root: &Path) -> AppResult<Vec<PathBuf>> {
        Ok(job::sweep_all(temp_root)?)
    }

    pub fn persist(&self) -> AppResult<()> {
        self.store.persist()
    }
}

/// A job listed in `active_downloads` until finished or dropped.
pub struct ActiveJob<'a> {
    book: &'a JobBook,
    job: &'a DownloadJob,
    open: bool,
}

impl ActiveJob<'_> {
    pub fn finish(mut self, success: bool) -> AppResult<BotAggregateState> {
        self.open = false;
        self.book.finish(self.job, success)
    }
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        if self.open {
            log::warn!("Job {} ended without a result, counting it as failed", self.job.id);
            if let Err(e) = self.book.finish(self.job, false) {
                log::warn!("Failed to record result of job {}: {}", self.job.id, e);
            }
        }
    }
}
