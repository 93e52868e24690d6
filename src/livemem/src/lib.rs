//! # livemem
//!
//! Live, cached view of another process's memory.
//!
//! Consumers register regions of the target's address space as fixed-size blocks. A
//! background loop re-reads every block that was accessed since its previous pass, so
//! reads come from a local snapshot instead of a cross-process call each time.
//!
//! This library provides:
//! - A block store keyed by remote address, safe to query from any thread
//! - Usage tracking that keeps unobserved blocks from costing remote reads
//! - A stoppable background refresh loop
//! - An optional idle-eviction retention policy
//! - Remote read sources for live processes and in-memory mocks
//!
//! ## Example
//!
//! ```
//! use livemem::{LiveMemory, LiveMemoryConfig, MockMemorySource};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let target = Arc::new(MockMemorySource::new(vec![1, 2, 3, 4, 5, 6, 7, 8], 0x1000));
//! let live = LiveMemory::new(target, LiveMemoryConfig::default())?;
//!
//! live.get_or_create(0x1000, 8)?;
//! live.run_cycle();
//!
//! let snapshot = live.peek(0x1000).expect("block is registered");
//! assert_eq!(snapshot.read_u32(0), Some(0x04030201));
//! println!("{}", live.describe(0x1000).unwrap_or_default());
//! # Ok(())
//! # }
//! ```

mod block;
pub mod config;
pub mod error;
mod live;
mod refresh;
pub mod retention;
pub mod source;
mod store;

#[doc(inline)]
pub use block::{BlockHandle, BlockSnapshot};
#[doc(inline)]
pub use config::{LiveMemoryConfig, RetentionConfig};
#[doc(inline)]
pub use error::{LiveMemError, ReadError, Result};
#[doc(inline)]
pub use live::{LiveMemory, RefreshState};
#[doc(inline)]
pub use refresh::{CycleReport, RefreshStats};
#[doc(inline)]
pub use retention::RetentionPolicy;
#[doc(inline)]
pub use source::{find_process, MockMemorySource, ProcessSource, RemoteReader};
