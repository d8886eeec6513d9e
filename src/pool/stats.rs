//! Pool statistics
//!
//! Live counters are independently atomic: updates interleave safely under
//! concurrency but are not synchronized with each other, so a snapshot is
//! eventually consistent rather than a single atomic transaction.

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::utils::atomic_max;

/// Immutable snapshot of pool counters
///
/// Obtained from [`FixedPool::statistics`](crate::FixedPool::statistics);
/// never a live view into the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Successful allocations
    pub allocations: u64,
    /// Successful deallocations
    pub deallocations: u64,
    /// Allocations rejected because the pool was exhausted
    pub allocation_failures: u64,
    /// Deallocations rejected as double frees
    pub double_free_attempts: u64,
    /// Deallocations rejected for invalid or corrupt pointers
    pub invalid_free_attempts: u64,
    /// Bytes currently issued
    pub current_usage: usize,
    /// High-water mark of issued bytes
    pub peak_usage: usize,
    /// Cumulative time spent in successful allocations
    pub total_alloc_ns: u64,
    /// Slowest single allocation
    pub max_alloc_ns: u64,
    /// Cumulative time spent in successful deallocations
    pub total_dealloc_ns: u64,
    /// Slowest single deallocation
    pub max_dealloc_ns: u64,
    /// Size of each block's payload in bytes
    pub block_size: usize,
    /// Fixed pool capacity in blocks
    pub total_blocks: usize,
    /// Blocks free at snapshot time
    pub free_blocks: usize,
}

impl PoolStats {
    /// Average successful-allocation latency, if any allocation happened
    pub fn average_alloc_ns(&self) -> Option<f64> {
        (self.allocations > 0).then(|| self.total_alloc_ns as f64 / self.allocations as f64)
    }

    /// Average successful-deallocation latency, if any deallocation happened
    pub fn average_dealloc_ns(&self) -> Option<f64> {
        (self.deallocations > 0).then(|| self.total_dealloc_ns as f64 / self.deallocations as f64)
    }

    /// Fraction of allocation attempts that succeeded (1.0 when none failed)
    pub fn allocation_efficiency(&self) -> f64 {
        let attempts = self.allocations + self.allocation_failures;
        if attempts > 0 {
            self.allocations as f64 / attempts as f64
        } else {
            1.0
        }
    }

    /// Total rejected frees across every rejection kind
    pub fn rejected_frees(&self) -> u64 {
        self.double_free_attempts + self.invalid_free_attempts
    }

    /// True while any allocation is outstanding
    pub fn has_active_allocations(&self) -> bool {
        self.allocations > self.deallocations
    }
}

impl core::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "Pool statistics:")?;
        writeln!(
            f,
            "  Blocks: {} free / {} total ({} bytes each)",
            self.free_blocks, self.total_blocks, self.block_size
        )?;
        writeln!(
            f,
            "  Usage: {} bytes current, {} bytes peak",
            self.current_usage, self.peak_usage
        )?;
        writeln!(f, "  Allocations: {}", self.allocations)?;
        writeln!(f, "  Deallocations: {}", self.deallocations)?;
        writeln!(f, "  Allocation failures: {}", self.allocation_failures)?;
        writeln!(f, "  Double free attempts: {}", self.double_free_attempts)?;
        writeln!(f, "  Invalid free attempts: {}", self.invalid_free_attempts)?;

        if let Some(avg) = self.average_alloc_ns() {
            writeln!(
                f,
                "  Allocate latency: {:.0} ns avg, {} ns max",
                avg, self.max_alloc_ns
            )?;
        }
        if let Some(avg) = self.average_dealloc_ns() {
            writeln!(
                f,
                "  Deallocate latency: {:.0} ns avg, {} ns max",
                avg, self.max_dealloc_ns
            )?;
        }

        write!(
            f,
            "  Allocation efficiency: {:.2}%",
            self.allocation_efficiency() * 100.0
        )
    }
}

/// Live atomic counters owned by the pool instance
///
/// Mutated by every allocate/deallocate call; read only through
/// [`snapshot`](AtomicPoolStats::snapshot); reset only by explicit request.
pub(crate) struct AtomicPoolStats {
    allocations: AtomicU64,
    deallocations: AtomicU64,
    allocation_failures: AtomicU64,
    double_free_attempts: AtomicU64,
    invalid_free_attempts: AtomicU64,
    current_usage: AtomicUsize,
    peak_usage: AtomicUsize,
    total_alloc_ns: AtomicU64,
    max_alloc_ns: AtomicU64,
    total_dealloc_ns: AtomicU64,
    max_dealloc_ns: AtomicU64,
}

impl AtomicPoolStats {
    pub(crate) const fn new() -> Self {
        Self {
            allocations: AtomicU64::new(0),
            deallocations: AtomicU64::new(0),
            allocation_failures: AtomicU64::new(0),
            double_free_attempts: AtomicU64::new(0),
            invalid_free_attempts: AtomicU64::new(0),
            current_usage: AtomicUsize::new(0),
            peak_usage: AtomicUsize::new(0),
            total_alloc_ns: AtomicU64::new(0),
            max_alloc_ns: AtomicU64::new(0),
            total_dealloc_ns: AtomicU64::new(0),
            max_dealloc_ns: AtomicU64::new(0),
        }
    }

    /// Record a successful allocation of `bytes` taking `elapsed`
    pub(crate) fn record_allocation(&self, bytes: usize, elapsed: Duration) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        let current = self.current_usage.fetch_add(bytes, Ordering::Relaxed) + bytes;
        atomic_max(&self.peak_usage, current);

        let ns = elapsed.as_nanos() as u64;
        self.total_alloc_ns.fetch_add(ns, Ordering::Relaxed);
        self.max_alloc_ns.fetch_max(ns, Ordering::Relaxed);
    }

    /// Record a successful deallocation of `bytes` taking `elapsed`
    pub(crate) fn record_deallocation(&self, bytes: usize, elapsed: Duration) {
        self.deallocations.fetch_add(1, Ordering::Relaxed);
        self.current_usage.fetch_sub(bytes, Ordering::Relaxed);

        let ns = elapsed.as_nanos() as u64;
        self.total_dealloc_ns.fetch_add(ns, Ordering::Relaxed);
        self.max_dealloc_ns.fetch_max(ns, Ordering::Relaxed);
    }

    pub(crate) fn record_allocation_failure(&self) {
        self.allocation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_double_free(&self) {
        self.double_free_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalid_free(&self) {
        self.invalid_free_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset every counter to zero
    pub(crate) fn reset(&self) {
        self.allocations.store(0, Ordering::Relaxed);
        self.deallocations.store(0, Ordering::Relaxed);
        self.allocation_failures.store(0, Ordering::Relaxed);
        self.double_free_attempts.store(0, Ordering::Relaxed);
        self.invalid_free_attempts.store(0, Ordering::Relaxed);
        self.current_usage.store(0, Ordering::Relaxed);
        self.peak_usage.store(0, Ordering::Relaxed);
        self.total_alloc_ns.store(0, Ordering::Relaxed);
        self.max_alloc_ns.store(0, Ordering::Relaxed);
        self.total_dealloc_ns.store(0, Ordering::Relaxed);
        self.max_dealloc_ns.store(0, Ordering::Relaxed);
    }

    /// Bytes currently issued
    pub(crate) fn current_usage(&self) -> usize {
        self.current_usage.load(Ordering::Relaxed)
    }

    /// Eventually-consistent snapshot combined with pool geometry
    pub(crate) fn snapshot(
        &self,
        block_size: usize,
        total_blocks: usize,
        free_blocks: usize,
    ) -> PoolStats {
        PoolStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            deallocations: self.deallocations.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
            double_free_attempts: self.double_free_attempts.load(Ordering::Relaxed),
            invalid_free_attempts: self.invalid_free_attempts.load(Ordering::Relaxed),
            current_usage: self.current_usage.load(Ordering::Relaxed),
            peak_usage: self.peak_usage.load(Ordering::Relaxed),
            total_alloc_ns: self.total_alloc_ns.load(Ordering::Relaxed),
            max_alloc_ns: self.max_alloc_ns.load(Ordering::Relaxed),
            total_dealloc_ns: self.total_dealloc_ns.load(Ordering::Relaxed),
            max_dealloc_ns: self.max_dealloc_ns.load(Ordering::Relaxed),
            block_size,
            total_blocks,
            free_blocks,
        }
    }
}
