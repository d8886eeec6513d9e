//! Pool construction configuration

use crate::error::{PoolError, PoolResult};
use crate::pool::free_list::MAX_BLOCKS;

/// Configuration for a [`FixedPool`](crate::FixedPool)
///
/// All fields are named; there is no positional ambiguity. `Default` gives a
/// release-oriented pool (no debug headers, no fill patterns); the
/// [`debug`](PoolConfig::debug) preset turns every check on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Minimum payload bytes per block; rounded up to `alignment`
    pub block_size: usize,
    /// Fixed pool capacity in blocks
    pub num_blocks: usize,
    /// Power-of-two byte alignment for blocks and header placement.
    /// Values below pointer width are rounded up to pointer width.
    pub alignment: usize,
    /// Magic tagging, checksums and leak/corruption scanning
    pub enable_debugging: bool,
    /// Concurrent free-list discipline: contention backoff on the CAS loops
    pub enable_thread_safety: bool,
    /// Zero payload bytes before returning from `allocate`
    pub zero_on_alloc: bool,
    /// Overwrite payload bytes with the poison pattern on `deallocate`
    pub poison_on_free: bool,
}

impl PoolConfig {
    /// Configuration with the given geometry and all optional checks off
    pub fn new(block_size: usize, num_blocks: usize) -> Self {
        Self {
            block_size,
            num_blocks,
            ..Self::default()
        }
    }

    /// Debug preset: headers, checksums, zeroing and poisoning all enabled
    pub fn debug(block_size: usize, num_blocks: usize) -> Self {
        Self {
            block_size,
            num_blocks,
            enable_debugging: true,
            zero_on_alloc: true,
            poison_on_free: true,
            ..Self::default()
        }
    }

    /// Production preset: thread safety on, instrumentation off
    pub fn production(block_size: usize, num_blocks: usize) -> Self {
        Self::new(block_size, num_blocks)
    }

    /// Validate the geometry parameters
    ///
    /// Checked before any memory is requested, so a rejected configuration
    /// never leaves a partial pool behind.
    pub fn validate(&self) -> PoolResult<()> {
        if self.block_size == 0 {
            return Err(PoolError::configuration("block_size must be non-zero"));
        }
        if self.num_blocks == 0 {
            return Err(PoolError::configuration("num_blocks must be non-zero"));
        }
        if !self.alignment.is_power_of_two() {
            return Err(PoolError::configuration("alignment must be a power of two"));
        }
        if self.num_blocks > MAX_BLOCKS {
            return Err(PoolError::configuration("num_blocks exceeds index space"));
        }
        Ok(())
    }

    /// Alignment actually used for layout: never below pointer width
    pub(crate) fn effective_alignment(&self) -> usize {
        self.alignment.max(core::mem::size_of::<usize>())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            block_size: 0,
            num_blocks: 0,
            alignment: core::mem::size_of::<usize>(),
            enable_debugging: false,
            enable_thread_safety: true,
            zero_on_alloc: false,
            poison_on_free: false,
        }
    }
}
