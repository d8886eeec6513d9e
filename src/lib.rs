//! Fixed-size block memory pool with predictable, low-latency allocation
//!
//! This crate provides a pool of uniformly sized memory blocks carved out of
//! one contiguous region at construction time. Blocks are handed out and
//! reclaimed in O(1) without ever calling the system allocator again:
//!
//! - Lock-free allocation: the free list is index-based with a
//!   generation-tagged head, so concurrent allocate/deallocate never block
//!   and address reuse cannot confuse the list
//! - Failure detection: double frees, invalid pointers and header corruption
//!   are rejected without mutating pool state, and counted
//! - Debug instrumentation: optional per-block magic tags, checksums,
//!   poisoning, leak and corruption scanning
//! - Statistics: per-instance atomic counters with latency tracking,
//!   exposed as immutable snapshots
//!
//! # Example
//!
//! ```
//! use blockpool::{FixedPool, PoolConfig};
//!
//! fn main() -> blockpool::PoolResult<()> {
//!     let pool = FixedPool::with_config(PoolConfig::new(64, 128))?;
//!
//!     let ptr = pool.allocate().expect("pool has free blocks");
//!     assert_eq!(pool.used_blocks(), 1);
//!
//!     pool.deallocate(ptr.as_ptr())?;
//!     assert!(pool.is_empty());
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `logging` (default): structured logging for construction, rejected
//!   frees and drop-time leak reports via `tracing`

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core modules
pub mod error;
pub mod pool;
pub mod traits;
pub mod utils;

// Re-export common types for convenience
pub use error::{PoolError, PoolResult};
pub use pool::{FixedPool, LeakRecord, PoolBox, PoolConfig, PoolStats};
pub use traits::{Allocator, MemoryUsage, StatisticsProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
