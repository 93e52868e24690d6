//! Query API
//!
//! `LiveMemory` is the only type consumers touch: it owns the block store, the refresh
//! loop, and the loop's lifecycle.

use crate::block::{BlockHandle, BlockSnapshot};
use crate::config::LiveMemoryConfig;
use crate::error::Result;
use crate::refresh::{CycleReport, ReadLimits, RefreshStats, RefreshThread, Refresher};
use crate::source::RemoteReader;
use crate::store::BlockStore;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Lifecycle of the background refresh loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    NotStarted,
    Running,
    /// Terminal: a stopped cache does not restart
    Stopped,
}

enum LoopState {
    NotStarted,
    Running(RefreshThread),
    Stopped,
}

/// A live, cached view of another process's memory
pub struct LiveMemory {
    store: Arc<BlockStore>,
    refresher: Arc<Refresher>,
    config: LiveMemoryConfig,
    state: Mutex<LoopState>,
}

impl LiveMemory {
    /// Create a cache over `reader`; the refresh loop is not started yet
    pub fn new(reader: Arc<dyn RemoteReader>, config: LiveMemoryConfig) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(BlockStore::new());
        let refresher = Arc::new(Refresher::new(
            Arc::clone(&store),
            reader,
            config.retention_policy(),
            ReadLimits {
                slow_read: config.slow_read_threshold(),
                timeout: config.read_timeout(),
            },
        ));

        Ok(LiveMemory {
            store,
            refresher,
            config,
            state: Mutex::new(LoopState::NotStarted),
        })
    }

    pub fn config(&self) -> &LiveMemoryConfig {
        &self.config
    }

    /// Register interest in `size` bytes at `address`
    ///
    /// The first call allocates a zero-filled block; later calls count as accesses. Reusing
    /// an address with a different size is an error, never a resize.
    pub fn get_or_create(&self, address: u64, size: usize) -> Result<BlockHandle> {
        self.store.get_or_create(address, size)
    }

    /// Latest refreshed copy of a block, or `None` if the address was never registered
    ///
    /// Peeking keeps the block active: it will be re-read on the next cycle.
    pub fn peek(&self, address: u64) -> Option<BlockSnapshot> {
        self.store.peek(address)
    }

    /// Snapshot the block behind `handle`
    pub fn snapshot(&self, handle: &BlockHandle) -> Option<BlockSnapshot> {
        self.peek(handle.address())
    }

    /// Diagnostic staleness text, e.g. "updated at 14:03:27, 3 accesses since"
    pub fn describe(&self, address: u64) -> Option<String> {
        self.store.describe(address)
    }

    /// Free a block and forget its address; returns whether it existed
    pub fn evict(&self, address: u64) -> bool {
        self.store.evict(address)
    }

    pub fn contains(&self, address: u64) -> bool {
        self.store.contains(address)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered addresses in ascending order
    pub fn addresses(&self) -> Vec<u64> {
        self.store.addresses()
    }

    /// Run one refresh cycle on the calling thread
    pub fn run_cycle(&self) -> CycleReport {
        self.refresher.run_cycle(Utc::now())
    }

    /// Run one refresh cycle stamped with `now`
    pub fn run_cycle_at(&self, now: DateTime<Utc>) -> CycleReport {
        self.refresher.run_cycle(now)
    }

    pub fn stats(&self) -> RefreshStats {
        self.refresher.stats()
    }

    /// Start the background refresh loop
    ///
    /// Returns `false` without doing anything if the loop is already running or was
    /// stopped.
    pub fn start_background_refresh(&self) -> Result<bool> {
        let mut state = self.state.lock();
        if !matches!(*state, LoopState::NotStarted) {
            return Ok(false);
        }

        let thread =
            RefreshThread::spawn(Arc::clone(&self.refresher), self.config.refresh_interval())?;
        *state = LoopState::Running(thread);
        Ok(true)
    }

    /// Stop the background loop and wait for it to exit
    ///
    /// The wait is bounded by the read timeout plus a short grace period; a loop stuck past
    /// that is detached. Returns whether a running loop was stopped. The cache stays usable for queries and
    /// manual cycles afterwards.
    pub fn stop_background_refresh(&self) -> bool {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, LoopState::Stopped) {
            LoopState::Running(thread) => {
                thread.stop();
                true
            }
            LoopState::NotStarted | LoopState::Stopped => false,
        }
    }

    pub fn refresh_state(&self) -> RefreshState {
        match *self.state.lock() {
            LoopState::NotStarted => RefreshState::NotStarted,
            LoopState::Running(_) => RefreshState::Running,
            LoopState::Stopped => RefreshState::Stopped,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_state() == RefreshState::Running
    }
}

impl Drop for LiveMemory {
    fn drop(&mut self) {
        self.stop_background_refresh();
    }
}
