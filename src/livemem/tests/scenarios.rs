//! Cache bookkeeping scenarios driven by manual refresh cycles.

use chrono::{Duration as TimeDelta, Utc};
use livemem::{LiveMemory, LiveMemoryConfig, MockMemorySource};
use std::sync::Arc;
use std::time::Duration;

fn live_over(source: &Arc<MockMemorySource>, config: LiveMemoryConfig) -> LiveMemory {
    LiveMemory::new(source.clone(), config).unwrap()
}

#[test]
fn test_peek_counts_accesses_before_refresh() {
    let source = Arc::new(MockMemorySource::zeroed(0x1000, 0x100));
    let live = live_over(&source, LiveMemoryConfig::default());

    live.get_or_create(0x1000, 8).unwrap();
    let mut last = None;
    for _ in 0..5 {
        last = live.peek(0x1000);
    }
    assert_eq!(last.unwrap().usage_count, 6);
}

#[test]
fn test_first_refresh_replaces_zeroed_buffer() {
    let source = Arc::new(MockMemorySource::new(vec![1, 2, 3, 4, 5, 6, 7, 8], 0x1000));
    let live = live_over(&source, LiveMemoryConfig::default());

    let handle = live.get_or_create(0x1000, 8).unwrap();
    assert_eq!(handle.usage_count(), 1);

    let before = live.peek(0x1000).unwrap();
    assert_eq!(before.usage_count, 2);
    assert_eq!(before.data, vec![0; 8]);

    let report = live.run_cycle();
    assert_eq!(report.refreshed, 1);

    let after = live.peek(0x1000).unwrap();
    assert_eq!(after.data, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    // Reset by the cycle, then counted again by this peek
    assert_eq!(after.usage_count, 1);
}

#[test]
fn test_unobserved_block_is_not_refreshed() {
    let source = Arc::new(MockMemorySource::zeroed(0x2000, 0x100));
    let live = live_over(&source, LiveMemoryConfig::default());

    // Creation counts as an access, so the first cycle reads the block once
    live.get_or_create(0x2000, 4).unwrap();
    let first = Utc::now();
    live.run_cycle_at(first);

    source.write(0x2000, &[9, 9, 9, 9]).unwrap();
    for i in 1..=5 {
        let report = live.run_cycle_at(first + TimeDelta::seconds(i));
        assert_eq!(report.idle, 1);
        assert_eq!(report.refreshed, 0);
    }

    assert_eq!(source.reads_at(0x2000), 1);
    let snapshot = live.peek(0x2000).unwrap();
    assert_eq!(snapshot.data, vec![0; 4]);
    assert_eq!(snapshot.last_refresh, Some(first));
}

#[test]
fn test_failed_read_retried_next_cycle() {
    let source = Arc::new(MockMemorySource::new(vec![0xaa; 0x10], 0x3000));
    let live = live_over(&source, LiveMemoryConfig::default());

    live.get_or_create(0x3000, 4).unwrap();
    live.get_or_create(0x3000, 4).unwrap();
    source.fail_at(0x3000);

    let report = live.run_cycle();
    assert_eq!(report.failed, 1);
    let snapshot = live.peek(0x3000).unwrap();
    // Still counting from before the failed cycle (2), plus this peek
    assert_eq!(snapshot.usage_count, 3);
    assert_eq!(snapshot.data, vec![0; 4]);
    assert!(snapshot.is_stale());

    source.clear_failure(0x3000);
    let report = live.run_cycle();
    assert_eq!(report.refreshed, 1);
    assert_eq!(source.reads_at(0x3000), 2);
    assert_eq!(live.peek(0x3000).unwrap().data, vec![0xaa; 4]);
}

#[test]
fn test_refresh_stamps_cycle_time() {
    let source = Arc::new(MockMemorySource::zeroed(0x1000, 0x100));
    let live = live_over(&source, LiveMemoryConfig::default());
    live.get_or_create(0x1000, 8).unwrap();

    let now = Utc::now();
    live.run_cycle_at(now);

    assert_eq!(live.peek(0x1000).unwrap().last_refresh, Some(now));
    assert!(live.describe(0x1000).unwrap().starts_with("updated at "));
}

#[test]
fn test_each_block_read_once_per_cycle() {
    let source = Arc::new(MockMemorySource::zeroed(0x1000, 0x1000));
    let live = live_over(&source, LiveMemoryConfig::default());
    for i in 0..16u64 {
        live.get_or_create(0x1000 + i * 0x40, 0x40).unwrap();
    }

    let report = live.run_cycle();
    assert_eq!(report.visited, 16);
    assert_eq!(report.refreshed, 16);
    assert_eq!(source.reads(), 16);
}

#[test]
fn test_retention_off_by_default() {
    let source = Arc::new(MockMemorySource::zeroed(0x1000, 0x100));
    let live = live_over(&source, LiveMemoryConfig::default());
    live.get_or_create(0x1000, 8).unwrap();

    let start = Utc::now();
    live.run_cycle_at(start);
    let report = live.run_cycle_at(start + TimeDelta::days(7));

    assert_eq!(report.evicted, 0);
    assert!(live.contains(0x1000));
}

#[test]
fn test_retention_evicts_only_long_idle_blocks() {
    let source = Arc::new(MockMemorySource::zeroed(0x1000, 0x100));
    let config = LiveMemoryConfig::default().with_idle_eviction(Duration::from_millis(100));
    let live = live_over(&source, config);

    live.get_or_create(0x1000, 8).unwrap();
    live.get_or_create(0x1040, 8).unwrap();
    let t0 = Utc::now();
    live.run_cycle_at(t0);

    // Within the window: nothing goes
    assert_eq!(live.run_cycle_at(t0 + TimeDelta::milliseconds(80)).evicted, 0);

    // Keep reading 0x1040; leave 0x1000 alone
    live.peek(0x1040).unwrap();
    let report = live.run_cycle_at(t0 + TimeDelta::milliseconds(150));
    assert_eq!(report.evicted, 1);
    assert!(!live.contains(0x1000));
    assert!(live.contains(0x1040));

    // 0x1040 was refreshed at +150ms and is idle from there
    assert_eq!(live.run_cycle_at(t0 + TimeDelta::milliseconds(240)).evicted, 0);
    assert_eq!(live.run_cycle_at(t0 + TimeDelta::milliseconds(260)).evicted, 1);
    assert!(live.is_empty());
    assert_eq!(live.stats().evicted, 2);
}

#[test]
fn test_failing_block_is_never_evicted() {
    let source = Arc::new(MockMemorySource::zeroed(0x1000, 0x100));
    let config = LiveMemoryConfig::default().with_idle_eviction(Duration::from_millis(10));
    let live = live_over(&source, config);

    live.get_or_create(0x1000, 8).unwrap();
    source.fail_at(0x1000);

    let t0 = Utc::now();
    live.run_cycle_at(t0);
    let report = live.run_cycle_at(t0 + TimeDelta::seconds(10));
    assert_eq!(report.failed, 1);
    assert_eq!(report.evicted, 0);
    assert!(live.contains(0x1000));
}

#[test]
fn test_evicted_address_can_be_registered_again() {
    let source = Arc::new(MockMemorySource::new(vec![5; 0x20], 0x1000));
    let live = live_over(&source, LiveMemoryConfig::default());

    live.get_or_create(0x1000, 8).unwrap();
    live.run_cycle();
    assert!(live.evict(0x1000));

    // A new block starts zeroed with a fresh counter, and may use a new size
    let handle = live.get_or_create(0x1000, 16).unwrap();
    assert_eq!(handle.usage_count(), 1);
    let snapshot = live.peek(0x1000).unwrap();
    assert_eq!(snapshot.data, vec![0; 16]);
    assert!(snapshot.is_stale());
}
