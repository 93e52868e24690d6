//! Block Store
//!
//! Owns the map from remote address to cached block. Lookups and access counting run
//! under the shared map lock; creation and eviction take it exclusively, so an eviction can
//! never interleave with a consumer access to the same block.

use crate::block::{Block, BlockHandle, BlockSnapshot};
use crate::error::{LiveMemError, Result};
use crate::retention::RetentionPolicy;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub(crate) struct BlockStore {
    blocks: RwLock<HashMap<u64, Arc<Block>>>,
}

impl BlockStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fetch the block for `address`, creating it on first use
    ///
    /// Either way the access is counted. An existing block is never resized: asking for a
    /// different size is reported as [`LiveMemError::SizeMismatch`].
    pub(crate) fn get_or_create(&self, address: u64, size: usize) -> Result<BlockHandle> {
        if let Some(block) = self.blocks.read().get(&address) {
            return touch_existing(block, size);
        }

        let mut blocks = self.blocks.write();
        // Another thread may have created it between the two locks
        if let Some(block) = blocks.get(&address) {
            return touch_existing(block, size);
        }

        let block = Block::new(address, size, Utc::now())?;
        let usage = block.touch();
        blocks.insert(address, Arc::new(block));
        tracing::debug!(target: "livemem", "Added block for {:#x} ({} bytes)", address, size);

        Ok(BlockHandle::new(address, size, usage))
    }

    /// Copy out the current contents of a block, counting the access
    pub(crate) fn peek(&self, address: u64) -> Option<BlockSnapshot> {
        let block = {
            let blocks = self.blocks.read();
            let block = blocks.get(&address)?;
            block.touch();
            Arc::clone(block)
        };
        Some(block.snapshot())
    }

    /// Diagnostic status; does not count as an access
    pub(crate) fn describe(&self, address: u64) -> Option<String> {
        self.blocks.read().get(&address).map(|b| b.describe())
    }

    /// Release a block's buffers and drop its entry in one step
    pub(crate) fn evict(&self, address: u64) -> bool {
        let removed = self.blocks.write().remove(&address).is_some();
        if removed {
            tracing::debug!(target: "livemem", "Deleted block for {:#x}", address);
        }
        removed
    }

    /// Evict every block `policy` considers idle at `now`, returning their addresses
    pub(crate) fn evict_idle(&self, policy: &RetentionPolicy, now: DateTime<Utc>) -> Vec<u64> {
        if !policy.is_enabled() {
            return Vec::new();
        }

        let mut evicted = Vec::new();
        self.blocks.write().retain(|&address, block| {
            let keep = !policy.should_evict(block.usage(), block.idle_since(), now);
            if !keep {
                evicted.push(address);
            }
            keep
        });

        for address in &evicted {
            tracing::debug!(target: "livemem", "Deleted idle block for {:#x}", address);
        }
        evicted
    }

    /// Every block currently stored, each exactly once
    pub(crate) fn blocks(&self) -> Vec<Arc<Block>> {
        self.blocks.read().values().cloned().collect()
    }

    pub(crate) fn contains(&self, address: u64) -> bool {
        self.blocks.read().contains_key(&address)
    }

    pub(crate) fn len(&self) -> usize {
        self.blocks.read().len()
    }

    /// Registered addresses in ascending order
    pub(crate) fn addresses(&self) -> Vec<u64> {
        let mut addresses: Vec<u64> = self.blocks.read().keys().copied().collect();
        addresses.sort_unstable();
        addresses
    }

    #[cfg(test)]
    pub(crate) fn usage(&self, address: u64) -> Option<u64> {
        self.blocks.read().get(&address).map(|b| b.usage())
    }
}

fn touch_existing(block: &Block, size: usize) -> Result<BlockHandle> {
    if block.size() != size {
        return Err(LiveMemError::SizeMismatch {
            address: block.address(),
            existing: block.size(),
            requested: size,
        });
    }
    let usage = block.touch();
    Ok(BlockHandle::new(block.address(), block.size(), usage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_get_or_create_new_block() {
        let store = BlockStore::new();
        let handle = store.get_or_create(0x1000, 8).unwrap();

        assert_eq!(handle.address(), 0x1000);
        assert_eq!(handle.size(), 8);
        assert_eq!(handle.usage_count(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_or_create_existing_counts_access() {
        let store = BlockStore::new();
        store.get_or_create(0x1000, 8).unwrap();
        let handle = store.get_or_create(0x1000, 8).unwrap();

        assert_eq!(handle.usage_count(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_size_mismatch_is_an_error() {
        let store = BlockStore::new();
        store.get_or_create(0x1000, 8).unwrap();

        let result = store.get_or_create(0x1000, 16);
        assert!(matches!(
            result,
            Err(LiveMemError::SizeMismatch {
                address: 0x1000,
                existing: 8,
                requested: 16
            })
        ));
        // Rejected calls are not accesses, and the block keeps its size
        assert_eq!(store.usage(0x1000), Some(1));
        assert_eq!(store.peek(0x1000).unwrap().size, 8);
    }

    #[test]
    fn test_peek_counts_access() {
        let store = BlockStore::new();
        store.get_or_create(0x1000, 8).unwrap();

        for _ in 0..3 {
            store.peek(0x1000).unwrap();
        }
        assert_eq!(store.usage(0x1000), Some(4));
    }

    #[test]
    fn test_peek_unknown_address() {
        let store = BlockStore::new();
        assert!(store.peek(0xdead).is_none());
        assert!(store.describe(0xdead).is_none());
    }

    #[test]
    fn test_describe_does_not_count() {
        let store = BlockStore::new();
        store.get_or_create(0x1000, 8).unwrap();
        store.describe(0x1000).unwrap();
        assert_eq!(store.usage(0x1000), Some(1));
    }

    #[test]
    fn test_evict_removes_entry() {
        let store = BlockStore::new();
        store.get_or_create(0x1000, 8).unwrap();

        assert!(store.evict(0x1000));
        assert!(!store.contains(0x1000));
        assert!(store.peek(0x1000).is_none());
        // Second eviction is a no-op
        assert!(!store.evict(0x1000));
    }

    #[test]
    fn test_snapshot_outlives_eviction() {
        let store = BlockStore::new();
        store.get_or_create(0x1000, 8).unwrap();
        let snapshot = store.peek(0x1000).unwrap();

        store.evict(0x1000);
        assert_eq!(snapshot.data, vec![0; 8]);
    }

    #[test]
    fn test_evict_idle_respects_usage() {
        let store = BlockStore::new();
        store.get_or_create(0x1000, 8).unwrap();
        store.get_or_create(0x2000, 8).unwrap();
        for block in store.blocks() {
            if block.address() == 0x2000 {
                block.reset_usage();
            }
        }

        let policy = RetentionPolicy::evict_idle(Duration::from_millis(1));
        let later = Utc::now() + chrono::Duration::seconds(60);
        assert_eq!(store.evict_idle(&policy, later), vec![0x2000]);
        assert_eq!(store.addresses(), vec![0x1000]);
    }

    #[test]
    fn test_evict_idle_disabled() {
        let store = BlockStore::new();
        store.get_or_create(0x1000, 8).unwrap();
        for block in store.blocks() {
            block.reset_usage();
        }

        let later = Utc::now() + chrono::Duration::days(1);
        assert!(store
            .evict_idle(&RetentionPolicy::KeepForever, later)
            .is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_addresses_sorted() {
        let store = BlockStore::new();
        for address in [0x3000, 0x1000, 0x2000] {
            store.get_or_create(address, 4).unwrap();
        }
        assert_eq!(store.addresses(), vec![0x1000, 0x2000, 0x3000]);
    }

    #[test]
    fn test_concurrent_get_or_create_single_block() {
        let store = Arc::new(BlockStore::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.get_or_create(0x4000, 16).unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(store.len(), 1);
        // No increments lost
        assert_eq!(store.usage(0x4000), Some(800));
    }
}
