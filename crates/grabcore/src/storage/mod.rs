//! Aggregate bot state and job bookkeeping
//!
//! The state is small (counters, per-user totals, the active-job table) and
//! non-critical, so it lives in a single JSON file rewritten after every
//! mutation. Stores are injected behind [`StatsStore`] so tests can run
//! against [`MemoryStore`].

pub mod jobs;
pub mod json_store;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::error::AppResult;
use crate::download::Platform;

pub use jobs::{ActiveJob, JobBook};
pub use json_store::JsonFileStore;
pub use memory::MemoryStore;

/// A job that has started but not reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveDownload {
    pub platform: Platform,
    pub url: String,
    pub work_dir: PathBuf,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total: u64,
    pub success: u64,
}

/// Everything persisted in the state file.
///
/// Missing keys take their defaults, so older or hand-edited files load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotAggregateState {
    pub downloads_completed: u64,
    pub downloads_failed: u64,
    pub last_restart: Option<DateTime<Utc>>,
    /// job id -> job
    pub active_downloads: BTreeMap<String, ActiveDownload>,
    /// user id -> totals
    pub user_stats: BTreeMap<String, UserStats>,
}

impl BotAggregateState {
    pub fn total_downloads(&self) -> u64 {
        self.downloads_completed + self.downloads_failed
    }

    pub fn user(&self, user_id: u64) -> UserStats {
        self.user_stats.get(&user_id.to_string()).copied().unwrap_or_default()
    }
}

/// Serialised access to [`BotAggregateState`].
///
/// Implementations hold one lock for the duration of `update`, including the
/// write-through, and never across an `.await`.
pub trait StatsStore: Send + Sync {
    /// Current state (a copy)
    fn snapshot(&self) -> BotAggregateState;

    /// Applies `mutate` under the lock, persists, and returns the new state.
    fn update(&self, mutate: &mut dyn FnMut(&mut BotAggregateState)) -> AppResult<BotAggregateState>;

    /// Writes the current state without changing it.
    fn persist(&self) -> AppResult<()>;
}
