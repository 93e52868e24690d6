//! Retention Policy
//!
//! Decides when an idle block is evicted. Off by default: blocks are cached for the
//! lifetime of the cache unless released explicitly.

use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Never evict; memory grows with the number of distinct addresses
    #[default]
    KeepForever,
    /// Evict blocks that have gone unread for longer than `threshold`
    EvictIdle { threshold: Duration },
}

impl RetentionPolicy {
    pub fn evict_idle(threshold: Duration) -> Self {
        RetentionPolicy::EvictIdle { threshold }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, RetentionPolicy::KeepForever)
    }

    /// Whether a block with `usage` accesses since its last refresh, holding data from
    /// `idle_since`, should be evicted at `now`
    pub fn should_evict(&self, usage: u64, idle_since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            RetentionPolicy::KeepForever => false,
            RetentionPolicy::EvictIdle { threshold } => {
                usage == 0 && idle_for(idle_since, now) > *threshold
            }
        }
    }
}

fn idle_for(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    // A clock step backwards reads as zero idle time
    now.signed_duration_since(since)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
