//! Error types for the block cache and the remote read boundary.

use thiserror::Error;

/// Failure of a single remote read.
///
/// Every call into a [`RemoteReader`](crate::RemoteReader) can fail; the refresh loop treats
/// these as per-block failures and retries on the next cycle.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("address {address:#x} (+{size} bytes) is not mapped in the target")]
    Unmapped { address: u64, size: usize },

    #[error("target process has exited")]
    ProcessExited,

    #[error("permission denied reading {address:#x}")]
    PermissionDenied { address: u64 },

    #[error("read of {size} bytes at {address:#x} did not return within {timeout:?}")]
    TimedOut {
        address: u64,
        size: usize,
        timeout: std::time::Duration,
    },

    #[error("failed to read {size} bytes at {address:#x}: {source}")]
    Io {
        address: u64,
        size: usize,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum LiveMemError {
    #[error("could not allocate {size} bytes for block {address:#x}")]
    Allocation { address: u64, size: usize },

    #[error("block {address:#x} already exists with size {existing}, requested {requested}")]
    SizeMismatch {
        address: u64,
        existing: usize,
        requested: usize,
    },

    #[error("block {address:#x} requested with zero size")]
    ZeroSize { address: u64 },

    #[error("read error: {0}")]
    Read(#[from] ReadError),

    #[error("no running process matches {0:?}")]
    ProcessNotFound(String),

    #[error("failed to attach to process {pid}: {source}")]
    Attach {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to spawn refresh thread: {0}")]
    RefreshThread(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LiveMemError>;
