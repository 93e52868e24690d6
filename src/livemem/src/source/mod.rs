//! Remote Read Boundary
//!
//! Sources the block cache can mirror memory from:
//! - Live process attachment via `ProcessSource`
//! - In-memory mock via `MockMemorySource` for tests and demos

mod mock;
mod process;
mod traits;

pub use mock::MockMemorySource;
pub use process::{find_process, ProcessSource};
pub use traits::RemoteReader;
