use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{BotAggregateState, StatsStore};
use crate::core::error::AppResult;

/// In-memory [`StatsStore`] for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<BotAggregateState>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: BotAggregateState) -> Self {
        Self {
            state: Mutex::new(state),
            writes: AtomicUsize::new(0),
        }
    }

    /// How many times the state would have been written to disk.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl StatsStore for MemoryStore {
    fn snapshot(&self) -> BotAggregateState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update(&self, mutate: &mut dyn FnMut(&mut BotAggregateState)) -> AppResult<BotAggregateState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        mutate(&mut state);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(state.clone())
    }

    fn persist(&self) -> AppResult<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
