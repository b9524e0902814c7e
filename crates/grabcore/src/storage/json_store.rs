use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{BotAggregateState, StatsStore};
use crate::core::error::AppResult;

/// [`StatsStore`] backed by a JSON file.
///
/// Every update rewrites the whole file through a temporary sibling and a
/// rename, so a crash mid-write leaves the previous version intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<BotAggregateState>,
}

impl JsonFileStore {
    /// Loads `path`, falling back to defaults when it is missing or corrupt.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = load_state(&path);
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, BotAggregateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, state: &BotAggregateState) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        let tmp = tmp_path(&self.path);
        fs_err::write(&tmp, json)?;
        fs_err::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn load_state(path: &Path) -> BotAggregateState {
    let data = match fs_err::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("State file {} not found, starting fresh", path.display());
            return BotAggregateState::default();
        }
        Err(e) => {
            log::warn!("Failed to read state file: {}", e);
            return BotAggregateState::default();
        }
    };

    match serde_json::from_str(&data) {
        Ok(state) => state,
        Err(e) => {
            log::warn!("State file {} is corrupt ({}), starting fresh", path.display(), e);
            BotAggregateState::default()
        }
    }
}

impl StatsStore for JsonFileStore {
    fn snapshot(&self) -> BotAggregateState {
        self.lock().clone()
    }

    fn update(&self, mutate: &mut dyn FnMut(&mut BotAggregateState)) -> AppResult<BotAggregateState> {
        let mut state = self.lock();
        mutate(&mut state);
        self.write(&state)?;
        Ok(state.clone())
    }

    fn persist(&self) -> AppResult<()> {
        let state = self.lock();
        self.write(&state)
    }
}
