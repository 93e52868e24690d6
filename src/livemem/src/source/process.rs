//! Live Process Memory Source
//!
//! Memory source implementation for reading from a running process.

use super::RemoteReader;
use crate::error::{LiveMemError, ReadError, Result};

use process_memory::{CopyAddress, ProcessHandle, TryIntoProcessHandle};
use std::fmt;
use std::io;
use sysinfo::System;

#[cfg(windows)]
const EXITED_CODES: &[i32] = &[6]; // ERROR_INVALID_HANDLE
#[cfg(windows)]
const UNMAPPED_CODES: &[i32] = &[299, 998]; // ERROR_PARTIAL_COPY, ERROR_NOACCESS

#[cfg(not(windows))]
const EXITED_CODES: &[i32] = &[3]; // ESRCH
#[cfg(not(windows))]
const UNMAPPED_CODES: &[i32] = &[5, 14]; // EIO, EFAULT

/// An attached target process
pub struct ProcessSource {
    pid: u32,
    name: Option<String>,
    handle: ProcessHandle,
}

impl fmt::Debug for ProcessSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSource")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// SAFETY: Windows HANDLEs are process-wide and can be safely used from any thread.
unsafe impl Send for ProcessSource {}
unsafe impl Sync for ProcessSource {}

impl RemoteReader for ProcessSource {
    fn read_into(&self, address: u64, buffer: &mut [u8]) -> std::result::Result<(), ReadError> {
        let size = buffer.len();
        let addr = usize::try_from(address).map_err(|_| ReadError::Unmapped { address, size })?;
        self.handle
            .copy_address(addr, buffer)
            .map_err(|e| classify_read_error(address, size, e))
    }

    fn is_live(&self) -> bool {
        true
    }
}

impl ProcessSource {
    /// Attach to a process by PID
    pub fn attach(pid: u32) -> Result<Self> {
        let handle = (pid as process_memory::Pid)
            .try_into_process_handle()
            .map_err(|source| LiveMemError::Attach { pid, source })?;

        Ok(ProcessSource {
            pid,
            name: None,
            handle,
        })
    }

    /// Attach to the largest running process whose name contains `name`
    pub fn attach_by_name(name: &str) -> Result<Self> {
        let pid =
            find_process(name).ok_or_else(|| LiveMemError::ProcessNotFound(name.to_string()))?;
        let mut source = Self::attach(pid)?;
        source.name = Some(name.to_string());
        Ok(source)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Find a running process by case-insensitive name substring
///
/// When several match (launchers, crash handlers, Wine helpers), the one using the most
/// memory wins.
pub fn find_process(name: &str) -> Option<u32> {
    let needle = name.to_lowercase();
    let mut system = System::new_all();
    system.refresh_all();

    system
        .processes()
        .values()
        .filter(|p| p.name().to_string_lossy().to_lowercase().contains(&needle))
        .max_by_key(|p| p.memory())
        .map(|p| p.pid().as_u32())
}

fn classify_read_error(address: u64, size: usize, err: io::Error) -> ReadError {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return ReadError::PermissionDenied { address };
    }

    match err.raw_os_error() {
        Some(code) if EXITED_CODES.contains(&code) => ReadError::ProcessExited,
        Some(code) if UNMAPPED_CODES.contains(&code) => ReadError::Unmapped { address, size },
        _ => ReadError::Io {
            address,
            size,
            source: err,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_process_no_match() {
        assert!(find_process("no-such-process-8f2c1e7b").is_none());
    }

    #[test]
    fn test_attach_by_name_not_found() {
        let result = ProcessSource::attach_by_name("no-such-process-8f2c1e7b");
        assert!(matches!(result, Err(LiveMemError::ProcessNotFound(_))));
    }

    #[test]
    fn test_classify_permission_denied() {
        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(
            classify_read_error(0x1000, 8, err),
            ReadError::PermissionDenied { address: 0x1000 }
        ));
    }

    #[test]
    fn test_classify_os_codes() {
        let exited = io::Error::from_raw_os_error(EXITED_CODES[0]);
        assert!(matches!(
            classify_read_error(0x1000, 8, exited),
            ReadError::ProcessExited
        ));

        let unmapped = io::Error::from_raw_os_error(UNMAPPED_CODES[0]);
        assert!(matches!(
            classify_read_error(0x2000, 4, unmapped),
            ReadError::Unmapped {
                address: 0x2000,
                size: 4
            }
        ));
    }

    #[test]
    fn test_classify_other_io_error() {
        let err = io::Error::other("boom");
        assert!(matches!(
            classify_read_error(0x1000, 8, err),
            ReadError::Io { size: 8, .. }
        ));
    }

    #[test]
    #[cfg(target_os = "linux")]
    #[ignore = "needs process_vm_readv, which some sandboxes block"]
    fn test_read_own_process() {
        let value: u64 = 0x1122_3344_5566_7788;
        let source = ProcessSource::attach(std::process::id()).unwrap();

        let bytes = source
            .read_bytes(&value as *const u64 as u64, 8)
            .unwrap();
        assert_eq!(bytes, value.to_ne_bytes());
        assert!(source.is_live());
    }
}
