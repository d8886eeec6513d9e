//! Allocator capability traits
//!
//! The interface is a capability set: a pair of required operations
//! ([`Allocator::allocate`] / [`Allocator::deallocate`]) plus optional
//! operations that every implementor gets with an explicit default behavior
//! (`owns` knows nothing, zero-sized allocations are supported, the maximum
//! size is the platform ceiling). Engines override only what they can answer.
//!
//! The fixed-block engine's inherent API does not depend on these traits;
//! they exist so a size-parameterized caller can sit in front of the engine
//! and have layout mismatches rejected at this boundary instead of being
//! delegated down.
//!
//! # Safety
//!
//! `Allocator` is an unsafe trait: implementors must return pointers that are
//! valid, properly aligned for the requested layout, and exclusive until
//! deallocated.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::error::PoolResult;
use crate::pool::PoolStats;

/// Size-parameterized allocation interface
///
/// # Safety Requirements
///
/// Implementors must ensure that:
/// - Returned pointers are valid and exclusive until deallocated
/// - Memory is aligned according to the layout
/// - Deallocation only releases previously issued pointers
pub unsafe trait Allocator {
    /// Allocates memory for the given layout
    ///
    /// # Safety
    /// - Returned memory is uninitialized (or zeroed only if the implementor
    ///   documents it) and must be initialized before use
    /// - The pointer must not outlive the allocator
    ///
    /// # Errors
    /// Returns an error if the layout cannot be satisfied or the backing
    /// store is exhausted.
    unsafe fn allocate(&self, layout: Layout) -> PoolResult<NonNull<[u8]>>;

    /// Deallocates memory at the given pointer
    ///
    /// # Safety
    /// - `ptr` must have been returned by this allocator with this `layout`
    /// - `ptr` must not be used after this call
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Whether `ptr` belongs to this allocator's backing store
    ///
    /// Optional; the default knows nothing and answers `false`.
    fn owns(&self, ptr: *const u8) -> bool {
        let _ = ptr;
        false
    }

    /// Largest single allocation this allocator can satisfy
    ///
    /// Optional; the default is the platform ceiling.
    fn max_allocation_size(&self) -> usize {
        isize::MAX as usize
    }

    /// Whether zero-sized allocations are supported
    ///
    /// Optional; the default supports them via a dangling pointer.
    fn supports_zero_sized_allocs(&self) -> bool {
        true
    }
}

/// Memory usage tracking
pub trait MemoryUsage {
    /// Bytes currently issued
    fn used_memory(&self) -> usize;

    /// Bytes still available, if known
    fn available_memory(&self) -> Option<usize>;

    /// Total capacity in bytes, if known
    fn total_memory(&self) -> Option<usize> {
        self.available_memory()
            .map(|available| self.used_memory() + available)
    }

    /// Usage as a percentage of total capacity, if total is known
    fn memory_usage_percent(&self) -> Option<f32> {
        self.total_memory().map(|total| {
            if total == 0 {
                0.0
            } else {
                (self.used_memory() as f32 / total as f32) * 100.0
            }
        })
    }
}

/// Statistics snapshot access
pub trait StatisticsProvider {
    /// Immutable snapshot of the live counters
    fn statistics(&self) -> PoolStats;

    /// Reset every counter to zero
    fn reset_statistics(&self);

    /// Whether statistics are being collected
    fn statistics_enabled(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullAllocator;

    // SAFETY: never returns a pointer, so there is nothing to violate.
    unsafe impl Allocator for NullAllocator {
        unsafe fn allocate(&self, layout: Layout) -> PoolResult<NonNull<[u8]>> {
            Err(crate::error::PoolError::out_of_memory(layout.size()))
        }

        unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {}
    }

    #[test]
    fn optional_operations_have_defaults() {
        let alloc = NullAllocator;
        assert!(!alloc.owns(core::ptr::null()));
        assert_eq!(alloc.max_allocation_size(), isize::MAX as usize);
        assert!(alloc.supports_zero_sized_allocs());
    }

    struct FixedUsage;

    impl MemoryUsage for FixedUsage {
        fn used_memory(&self) -> usize {
            25
        }

        fn available_memory(&self) -> Option<usize> {
            Some(75)
        }
    }

    #[test]
    fn usage_defaults_derive_total_and_percent() {
        let usage = FixedUsage;
        assert_eq!(usage.total_memory(), Some(100));
        assert_eq!(usage.memory_usage_percent(), Some(25.0));
    }
}
