//! Mock Memory Source
//!
//! An in-memory target whose contents can be changed while a cache is mirroring it.

use super::RemoteReader;
use crate::error::ReadError;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};

/// A mock remote address space for tests and demos
pub struct MockMemorySource {
    /// Raw memory data (contiguous, starting at base_address)
    data: RwLock<Vec<u8>>,
    /// Base virtual address for the data
    base_address: u64,
    /// Addresses whose reads fail until cleared
    failures: Mutex<HashSet<u64>>,
    /// Read attempts per address
    reads: Mutex<HashMap<u64, usize>>,
}

impl MockMemorySource {
    /// Create a new mock with data at given base address
    pub fn new(data: Vec<u8>, base_address: u64) -> Self {
        Self {
            data: RwLock::new(data),
            base_address,
            failures: Mutex::new(HashSet::new()),
            reads: Mutex::new(HashMap::new()),
        }
    }

    /// Create a zero-filled mock of `len` bytes
    pub fn zeroed(base_address: u64, len: usize) -> Self {
        Self::new(vec![0; len], base_address)
    }

    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// Overwrite target memory at `address`
    pub fn write(&self, address: u64, bytes: &[u8]) -> Result<(), ReadError> {
        let mut data = self.data.write();
        let range = self.range(address, bytes.len(), data.len())?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Make every read starting at `address` fail
    pub fn fail_at(&self, address: u64) {
        self.failures.lock().insert(address);
    }

    pub fn clear_failure(&self, address: u64) {
        self.failures.lock().remove(&address);
    }

    /// Total read attempts, failed ones included
    pub fn reads(&self) -> usize {
        self.reads.lock().values().sum()
    }

    pub fn reads_at(&self, address: u64) -> usize {
        self.reads.lock().get(&address).copied().unwrap_or(0)
    }

    fn range(
        &self,
        address: u64,
        size: usize,
        len: usize,
    ) -> Result<std::ops::Range<usize>, ReadError> {
        let unmapped = || ReadError::Unmapped { address, size };
        let offset = address
            .checked_sub(self.base_address)
            .and_then(|o| usize::try_from(o).ok())
            .ok_or_else(unmapped)?;
        let end = offset.checked_add(size).ok_or_else(unmapped)?;
        if end > len {
            return Err(unmapped());
        }
        Ok(offset..end)
    }
}

impl RemoteReader for MockMemorySource {
    fn read_into(&self, address: u64, buffer: &mut [u8]) -> Result<(), ReadError> {
        *self.reads.lock().entry(address).or_insert(0) += 1;

        if self.failures.lock().contains(&address) {
            return Err(ReadError::Unmapped {
                address,
                size: buffer.len(),
            });
        }

        let data = self.data.read();
        let range = self.range(address, buffer.len(), data.len())?;
        buffer.copy_from_slice(&data[range]);
        Ok(())
    }

    fn is_live(&self) -> bool {
        false
    }
}
