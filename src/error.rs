//! Error types for pool operations

use thiserror::Error;

/// Result type for pool operations
pub type PoolResult<T> = core::result::Result<T, PoolError>;

/// Pool operation errors
///
/// Construction failures (`Configuration`, `OutOfMemory`) are fatal: no pool
/// instance exists and no memory is retained. The remaining kinds are local
/// and recoverable: a rejected `deallocate` leaves the pool exactly as it
/// was and bumps the matching statistics counter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Invalid construction parameters
    #[error("invalid pool configuration: {reason}")]
    Configuration {
        /// What was wrong with the parameters
        reason: &'static str,
    },

    /// The system could not supply the pool region
    #[error("failed to reserve {requested} bytes for the pool region")]
    OutOfMemory {
        /// Total region size that was requested
        requested: usize,
    },

    /// Every block is currently issued
    ///
    /// The engine-level [`allocate`](crate::FixedPool::allocate) signals
    /// exhaustion with `None`; this kind exists for the size-parameterized
    /// [`Allocator`](crate::traits::Allocator) surface.
    #[error("pool exhausted: all {capacity} blocks in use")]
    Exhausted {
        /// Fixed capacity of the pool in blocks
        capacity: usize,
    },

    /// Pointer is null, outside the pool, or not on a block boundary
    #[error("pointer {addr:#x} does not belong to this pool")]
    InvalidPointer {
        /// The offending address
        addr: usize,
    },

    /// The block is already free
    #[error("double free of block {index}")]
    DoubleFree {
        /// Index of the block within the pool
        index: usize,
    },

    /// The block's debug header failed checksum verification
    #[error("corruption detected in header of block {index}")]
    CorruptionDetected {
        /// Index of the block within the pool
        index: usize,
    },
}

impl PoolError {
    /// Create a configuration error
    pub fn configuration(reason: &'static str) -> Self {
        Self::Configuration { reason }
    }

    /// Create an out of memory error
    pub fn out_of_memory(requested: usize) -> Self {
        Self::OutOfMemory { requested }
    }

    /// Create an exhaustion error
    pub fn exhausted(capacity: usize) -> Self {
        Self::Exhausted { capacity }
    }

    /// Create an invalid pointer error
    pub fn invalid_pointer(ptr: *const u8) -> Self {
        Self::InvalidPointer { addr: ptr as usize }
    }

    /// Create a double free error
    pub fn double_free(index: usize) -> Self {
        Self::DoubleFree { index }
    }

    /// Create a corruption error
    pub fn corruption(index: usize) -> Self {
        Self::CorruptionDetected { index }
    }

    /// True for errors that can only occur at construction time
    pub fn is_construction_error(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::OutOfMemory { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = PoolError::configuration("block_size must be non-zero");
        assert_eq!(
            err.to_string(),
            "invalid pool configuration: block_size must be non-zero"
        );

        let err = PoolError::invalid_pointer(0x1000 as *const u8);
        assert_eq!(err.to_string(), "pointer 0x1000 does not belong to this pool");

        assert_eq!(PoolError::double_free(3).to_string(), "double free of block 3");
    }

    #[test]
    fn construction_classification() {
        assert!(PoolError::configuration("x").is_construction_error());
        assert!(PoolError::out_of_memory(64).is_construction_error());
        assert!(!PoolError::double_free(0).is_construction_error());
        assert!(!PoolError::invalid_pointer(core::ptr::null()).is_construction_error());
    }
}
