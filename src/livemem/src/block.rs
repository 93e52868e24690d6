//! Cached Blocks
//!
//! A block is a fixed-size local mirror of one contiguous region of the target's address
//! space. Its buffer is allocated once, zero-filled, and never resized.

use crate::error::{LiveMemError, Result};

use byteorder::{ByteOrder, LE};
use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicU64, Ordering};

/// One cached region, owned by the block store
pub(crate) struct Block {
    address: u64,
    size: usize,
    created_at: DateTime<Utc>,
    /// Consumer accesses since the last successful refresh
    usage: AtomicU64,
    /// Front buffer: what readers see
    front: Mutex<Front>,
    /// Back buffer: only the refresh path writes here, then swaps it to the front.
    /// Empty while a read owns it, or after a read was abandoned.
    back: Mutex<Option<Box<[u8]>>>,
}

struct Front {
    buffer: Box<[u8]>,
    last_refresh: Option<DateTime<Utc>>,
}

impl Block {
    /// Allocate a zero-filled block of `size` bytes
    pub(crate) fn new(address: u64, size: usize, created_at: DateTime<Utc>) -> Result<Self> {
        if size == 0 {
            return Err(LiveMemError::ZeroSize { address });
        }

        Ok(Block {
            address,
            size,
            created_at,
            usage: AtomicU64::new(0),
            front: Mutex::new(Front {
                buffer: zeroed(address, size)?,
                last_refresh: None,
            }),
            back: Mutex::new(Some(zeroed(address, size)?)),
        })
    }

    pub(crate) fn address(&self) -> u64 {
        self.address
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Record a consumer access, returning the new count
    pub(crate) fn touch(&self) -> u64 {
        self.usage.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn usage(&self) -> u64 {
        self.usage.load(Ordering::Acquire)
    }

    pub(crate) fn reset_usage(&self) {
        self.usage.store(0, Ordering::Release);
    }

    pub(crate) fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.front.lock().last_refresh
    }

    /// When the block last held fresh data, or its creation time if it never has
    pub(crate) fn idle_since(&self) -> DateTime<Utc> {
        self.last_refresh().unwrap_or(self.created_at)
    }

    /// Hand out the back buffer for a remote read
    ///
    /// The read fills it without touching the front lock, so readers are never blocked on
    /// remote I/O. If the previous buffer was lost to an abandoned read a fresh one is
    /// allocated.
    pub(crate) fn take_back(&self) -> Result<Box<[u8]>> {
        match self.back.lock().take() {
            Some(buffer) => Ok(buffer),
            None => zeroed(self.address, self.size),
        }
    }

    /// Return an unused back buffer after a failed read; the front keeps the last good data
    pub(crate) fn restore_back(&self, buffer: Box<[u8]>) {
        *self.back.lock() = Some(buffer);
    }

    /// Publish a filled buffer as the block's contents, stamped with `at`
    pub(crate) fn commit(&self, mut buffer: Box<[u8]>, at: DateTime<Utc>) {
        {
            let mut front = self.front.lock();
            std::mem::swap(&mut front.buffer, &mut buffer);
            front.last_refresh = match front.last_refresh {
                Some(previous) if previous > at => Some(previous),
                _ => Some(at),
            };
        }
        self.restore_back(buffer);
    }

    pub(crate) fn snapshot(&self) -> BlockSnapshot {
        let front = self.front.lock();
        BlockSnapshot {
            address: self.address,
            size: self.size,
            data: front.buffer.to_vec(),
            last_refresh: front.last_refresh,
            usage_count: self.usage(),
        }
    }

    /// Short status line, e.g. "updated at 14:03:27, 3 accesses since"
    pub(crate) fn describe(&self) -> String {
        let accesses = self.usage();
        match self.last_refresh() {
            Some(at) => format!(
                "updated at {}, {} accesses since",
                at.with_timezone(&Local).format("%H:%M:%S"),
                accesses
            ),
            None => format!("not yet updated, {} accesses since", accesses),
        }
    }
}

fn zeroed(address: u64, size: usize) -> Result<Box<[u8]>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| LiveMemError::Allocation { address, size })?;
    buffer.resize(size, 0);
    Ok(buffer.into_boxed_slice())
}

/// Returned by `get_or_create`: identifies a block without borrowing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHandle {
    address: u64,
    size: usize,
    usage_count: u64,
}

impl BlockHandle {
    pub(crate) fn new(address: u64, size: usize, usage_count: u64) -> Self {
        BlockHandle {
            address,
            size,
            usage_count,
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Usage counter right after this access
    pub fn usage_count(&self) -> u64 {
        self.usage_count
    }
}

/// Point-in-time copy of a block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockSnapshot {
    pub address: u64,
    pub size: usize,
    #[serde(serialize_with = "as_hex")]
    pub data: Vec<u8>,
    pub last_refresh: Option<DateTime<Utc>>,
    pub usage_count: u64,
}

fn as_hex<S: Serializer>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(data))
}

impl BlockSnapshot {
    /// True until the first successful refresh
    pub fn is_stale(&self) -> bool {
        self.last_refresh.is_none()
    }

    fn field(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.data.get(offset..offset.checked_add(len)?)
    }

    pub fn read_u8(&self, offset: usize) -> Option<u8> {
        self.data.get(offset).copied()
    }

    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        self.field(offset, 2).map(LE::read_u16)
    }

    pub fn read_u32(&self, offset: usize) -> Option<u32> {
        self.field(offset, 4).map(LE::read_u32)
    }

    pub fn read_i32(&self, offset: usize) -> Option<i32> {
        self.field(offset, 4).map(LE::read_i32)
    }

    pub fn read_u64(&self, offset: usize) -> Option<u64> {
        self.field(offset, 8).map(LE::read_u64)
    }

    pub fn read_f32(&self, offset: usize) -> Option<f32> {
        self.field(offset, 4).map(LE::read_f32)
    }

    pub fn read_f64(&self, offset: usize) -> Option<f64> {
        self.field(offset, 8).map(LE::read_f64)
    }

    /// Read a 64-bit target pointer
    pub fn read_ptr(&self, offset: usize) -> Option<u64> {
        self.read_u64(offset)
    }

    /// Read a null-terminated string, stopping at the end of the block
    pub fn read_cstring(&self, offset: usize) -> Option<String> {
        let bytes = self.data.get(offset..)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Some(String::from_utf8_lossy(&bytes[..end]).to_string())
    }
}
