//! Remote Reader Trait
//!
//! Core abstraction for reading bytes out of another address space.

use crate::error::ReadError;

/// Trait for reading memory from a target (live process, mock, etc.)
///
/// Implementations must be callable from the refresh thread while consumers hold their own
/// references, hence `Send + Sync`.
pub trait RemoteReader: Send + Sync {
    /// Read `buffer.len()` bytes starting at `address` into `buffer`
    fn read_into(&self, address: u64, buffer: &mut [u8]) -> Result<(), ReadError>;

    /// Check if this is a live source
    fn is_live(&self) -> bool;

    /// Read bytes into a freshly allocated buffer
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>, ReadError> {
        let mut buffer = vec![0u8; size];
        self.read_into(address, &mut buffer)?;
        Ok(buffer)
    }
}
