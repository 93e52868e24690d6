//! Refresh Loop
//!
//! Periodically re-reads every block that consumers touched since the previous cycle.
//! Idle blocks are skipped and keep their stale contents. A failed read leaves the block's
//! usage counter alone so it is retried next cycle.
//!
//! Remote reads run on a separate reader thread. A read that has not returned within the
//! read timeout is abandoned for that cycle: the reader thread is left to finish on its own
//! and the next read gets a fresh one.

use crate::block::Block;
use crate::error::{LiveMemError, ReadError, Result};
use crate::retention::RetentionPolicy;
use crate::source::RemoteReader;
use crate::store::BlockStore;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Extra time `stop` allows on top of the read timeout before giving up on the loop
const STOP_GRACE: Duration = Duration::from_secs(1);

/// Outcome of one refresh cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Blocks examined (each block once)
    pub visited: usize,
    pub refreshed: usize,
    /// Skipped because nothing read them since the last cycle
    pub idle: usize,
    /// Includes timed out reads
    pub failed: usize,
    pub timed_out: usize,
    pub evicted: usize,
}

/// Totals across all cycles run so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub cycles: u64,
    pub refreshed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub evicted: u64,
}

#[derive(Default)]
struct StatsCounters {
    cycles: AtomicU64,
    refreshed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    evicted: AtomicU64,
}

/// Timing knobs for a [`Refresher`]
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReadLimits {
    /// Reads slower than this are logged
    pub slow_read: Duration,
    /// Reads slower than this are abandoned
    pub timeout: Duration,
}

struct ReadJob {
    address: u64,
    buffer: Box<[u8]>,
}

struct ReadDone {
    buffer: Box<[u8]>,
    result: std::result::Result<(), ReadError>,
}

/// A thread that performs remote reads one at a time
struct ReadWorker {
    jobs: Sender<ReadJob>,
    done: Receiver<ReadDone>,
}

impl ReadWorker {
    fn spawn(reader: Arc<dyn RemoteReader>) -> Result<Self> {
        let (jobs, job_rx) = crossbeam_channel::bounded::<ReadJob>(1);
        let (done_tx, done) = crossbeam_channel::bounded::<ReadDone>(1);

        // Detached: a hung read must not hold up whoever drops the worker
        thread::Builder::new()
            .name("livemem-read".to_string())
            .spawn(move || {
                for mut job in job_rx {
                    let result = reader.read_into(job.address, &mut job.buffer);
                    let done = ReadDone {
                        buffer: job.buffer,
                        result,
                    };
                    if done_tx.send(done).is_err() {
                        break;
                    }
                }
            })
            .map_err(LiveMemError::RefreshThread)?;

        Ok(ReadWorker { jobs, done })
    }

    /// Run one read, or `None` if it did not finish within `timeout`
    fn read(&self, job: ReadJob, timeout: Duration) -> Option<ReadDone> {
        self.jobs.send(job).ok()?;
        self.done.recv_timeout(timeout).ok()
    }
}

enum ReadOutcome {
    Complete(ReadDone),
    /// Could not hand the read to a reader thread; the buffer comes back untouched
    Unavailable(Box<[u8]>, LiveMemError),
    /// The reader thread kept the buffer
    TimedOut,
}

pub(crate) struct Refresher {
    store: Arc<BlockStore>,
    reader: Arc<dyn RemoteReader>,
    retention: RetentionPolicy,
    limits: ReadLimits,
    worker: Mutex<Option<ReadWorker>>,
    stats: StatsCounters,
}

impl Refresher {
    pub(crate) fn new(
        store: Arc<BlockStore>,
        reader: Arc<dyn RemoteReader>,
        retention: RetentionPolicy,
        limits: ReadLimits,
    ) -> Self {
        Refresher {
            store,
            reader,
            retention,
            limits,
            worker: Mutex::new(None),
            stats: StatsCounters::default(),
        }
    }

    /// Run one cycle with `now` as the refresh timestamp
    pub(crate) fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        self.cycle(now, None)
    }

    /// One pass over the store; with `stop`, a pending stop request ends the pass early
    fn cycle(&self, now: DateTime<Utc>, stop: Option<&Receiver<()>>) -> CycleReport {
        let mut report = CycleReport::default();

        for block in self.store.blocks() {
            if stop.is_some_and(|stop| !stop.is_empty()) {
                break;
            }
            report.visited += 1;

            if block.usage() == 0 {
                report.idle += 1;
                continue;
            }

            match self.refresh_block(&block, now) {
                Ok(()) => {
                    block.reset_usage();
                    report.refreshed += 1;
                }
                Err(e) => {
                    if matches!(e, LiveMemError::Read(ReadError::TimedOut { .. })) {
                        report.timed_out += 1;
                    }
                    tracing::warn!(
                        target: "livemem",
                        "Failed to refresh block {:#x}: {}",
                        block.address(),
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        report.evicted = self.store.evict_idle(&self.retention, now).len();

        self.stats.cycles.fetch_add(1, Ordering::Relaxed);
        self.stats
            .refreshed
            .fetch_add(report.refreshed as u64, Ordering::Relaxed);
        self.stats
            .failed
            .fetch_add(report.failed as u64, Ordering::Relaxed);
        self.stats
            .timed_out
            .fetch_add(report.timed_out as u64, Ordering::Relaxed);
        self.stats
            .evicted
            .fetch_add(report.evicted as u64, Ordering::Relaxed);

        tracing::trace!(target: "livemem", "Refresh cycle: {:?}", report);
        report
    }

    fn refresh_block(&self, block: &Block, now: DateTime<Utc>) -> Result<()> {
        let buffer = block.take_back()?;

        let started = Instant::now();
        let outcome = self.read_remote(block.address(), buffer);
        let elapsed = started.elapsed();
        if elapsed > self.limits.slow_read {
            tracing::warn!(
                target: "livemem",
                "Slow read of {} bytes at {:#x}: {:?}",
                block.size(),
                block.address(),
                elapsed
            );
        }

        match outcome {
            ReadOutcome::Complete(ReadDone {
                buffer,
                result: Ok(()),
            }) => {
                block.commit(buffer, now);
                Ok(())
            }
            ReadOutcome::Complete(ReadDone {
                buffer,
                result: Err(e),
            }) => {
                block.restore_back(buffer);
                Err(e.into())
            }
            ReadOutcome::Unavailable(buffer, e) => {
                block.restore_back(buffer);
                Err(e)
            }
            ReadOutcome::TimedOut => Err(ReadError::TimedOut {
                address: block.address(),
                size: block.size(),
                timeout: self.limits.timeout,
            }
            .into()),
        }
    }

    fn read_remote(&self, address: u64, buffer: Box<[u8]>) -> ReadOutcome {
        let mut slot = self.worker.lock();
        let worker = match slot.take() {
            Some(worker) => worker,
            None => match ReadWorker::spawn(Arc::clone(&self.reader)) {
                Ok(worker) => worker,
                Err(e) => return ReadOutcome::Unavailable(buffer, e),
            },
        };

        match worker.read(ReadJob { address, buffer }, self.limits.timeout) {
            Some(done) => {
                *slot = Some(worker);
                ReadOutcome::Complete(done)
            }
            // Dropping the worker abandons its thread along with the buffer
            None => ReadOutcome::TimedOut,
        }
    }

    pub(crate) fn stats(&self) -> RefreshStats {
        RefreshStats {
            cycles: self.stats.cycles.load(Ordering::Relaxed),
            refreshed: self.stats.refreshed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            timed_out: self.stats.timed_out.load(Ordering::Relaxed),
            evicted: self.stats.evicted.load(Ordering::Relaxed),
        }
    }

    /// Cycle until a stop is requested or the sender goes away
    fn run(&self, interval: Duration, stop: Receiver<()>) {
        tracing::info!(target: "livemem", "Started block loop ({:?} interval)", interval);

        loop {
            match stop.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            self.cycle(Utc::now(), Some(&stop));

            match stop.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        tracing::info!(target: "livemem", "Stopped block loop");
    }
}

/// The background thread running a [`Refresher`]
pub(crate) struct RefreshThread {
    stop: Sender<()>,
    /// Disconnects when the thread exits, normally or by panic
    exited: Receiver<()>,
    handle: JoinHandle<()>,
    stop_timeout: Duration,
}

impl RefreshThread {
    pub(crate) fn spawn(refresher: Arc<Refresher>, interval: Duration) -> Result<Self> {
        let (stop, stop_rx) = crossbeam_channel::bounded(1);
        let (exited_tx, exited) = crossbeam_channel::bounded::<()>(0);
        let stop_timeout = refresher.limits.timeout.saturating_add(STOP_GRACE);

        let handle = thread::Builder::new()
            .name("livemem-refresh".to_string())
            .spawn(move || {
                let _exited = exited_tx;
                refresher.run(interval, stop_rx)
            })
            .map_err(LiveMemError::RefreshThread)?;

        Ok(RefreshThread {
            stop,
            exited,
            handle,
            stop_timeout,
        })
    }

    /// Signal the loop and wait a bounded time for it to exit
    ///
    /// Returns false if the loop did not exit in time; its thread is then left detached.
    pub(crate) fn stop(self) -> bool {
        // Full means a stop is already pending; disconnected means the loop is gone
        let _ = self.stop.try_send(());

        match self.exited.recv_timeout(self.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    tracing::error!(target: "livemem", "Refresh thread panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    target: "livemem",
                    "Refresh thread did not stop within {:?}; detaching it",
                    self.stop_timeout
                );
                false
            }
        }
    }
}
