//! Fixed-size block pool engine
//!
//! # Safety
//!
//! This module implements a thread-safe pool of fixed-size blocks:
//! - One contiguous aligned region, owned exclusively for the pool lifetime
//! - An index-based, generation-tagged lock-free free list
//! - Pointer validation (bounds + block alignment) on every deallocation
//! - Optional per-block debug headers with magic tags and checksums
//!
//! ## Invariants
//!
//! - Every block is aligned to the configured alignment
//! - `free_blocks() + used_blocks() == total_blocks()` at all times
//! - A block transitions `Free -> Allocated` only through a successful
//!   `allocate` and `Allocated -> Free` only through a successful
//!   `deallocate`; rejected calls mutate nothing

use core::alloc::Layout;
use core::ptr::{self, NonNull};
use std::time::Instant;

use parking_lot::Mutex;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

use super::config::PoolConfig;
use super::debug::{self, ALLOC_MAGIC, DebugHeader, FREE_MAGIC, HEADER_SIZE, LeakRecord};
use super::free_list::FreeList;
use super::stats::{AtomicPoolStats, PoolStats};
use crate::error::{PoolError, PoolResult};
use crate::traits::{Allocator, MemoryUsage, StatisticsProvider};
use crate::utils::align_up;

/// Fixed-size block memory pool
///
/// A contiguous region pre-divided into `num_blocks` slots of uniform size,
/// handed out and reclaimed in O(1) without touching the system allocator
/// after construction.
///
/// # Memory Layout
/// ```text
/// [hdr|payload][hdr|payload][hdr|payload]...[hdr|payload]
///  '-- block 0  '-- block 1  '-- block 2      '-- block n-1
/// ```
///
/// The `hdr` segment exists only when debugging is enabled; otherwise a
/// block is exactly its payload and payload pointers coincide with block
/// starts. Free blocks are linked by index, never by pointers threaded
/// through their memory.
pub struct FixedPool {
    /// Start of the owned region
    base: NonNull<u8>,

    /// Layout the region was allocated with; used exactly once to release it
    region_layout: Layout,

    /// Payload bytes per block, rounded up to the alignment
    block_size: usize,

    /// Alignment of blocks and header placement
    alignment: usize,

    /// Bytes reserved ahead of each payload for the debug header (0 when
    /// debugging is off)
    header_size: usize,

    /// Distance between consecutive block starts
    block_stride: usize,

    /// Fixed pool capacity
    num_blocks: usize,

    /// Construction configuration
    config: PoolConfig,

    /// Lock-free free list over block indices
    free_list: FreeList,

    /// Live counters, mutated by every operation
    stats: AtomicPoolStats,

    /// Exclusive lock for whole-pool scans; never touched by the hot path
    scan_lock: Mutex<()>,

    /// Origin for header timestamps
    created_at: Instant,
}

impl FixedPool {
    /// Creates a pool from a full configuration
    ///
    /// # Errors
    /// - [`PoolError::Configuration`] for zero geometry, a non-power-of-two
    ///   alignment, capacity beyond the index space, or a region size that
    ///   overflows
    /// - [`PoolError::OutOfMemory`] if the system refuses the region
    ///
    /// Neither failure leaves any resources held.
    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;

        let alignment = config.effective_alignment();
        if config.block_size > isize::MAX as usize - alignment {
            return Err(PoolError::configuration("block_size exceeds address space"));
        }
        let block_size = align_up(config.block_size, alignment);
        let header_size = if config.enable_debugging {
            align_up(HEADER_SIZE, alignment)
        } else {
            0
        };
        let block_stride = header_size + block_size;

        let total_size = block_stride
            .checked_mul(config.num_blocks)
            .ok_or_else(|| PoolError::configuration("pool region size overflows"))?;
        let region_layout = Layout::from_size_align(total_size, alignment)
            .map_err(|_| PoolError::configuration("pool region layout is invalid"))?;

        // SAFETY: region_layout has a validated non-zero size.
        let raw = unsafe { std::alloc::alloc_zeroed(region_layout) };
        let base = NonNull::new(raw).ok_or_else(|| PoolError::out_of_memory(total_size))?;

        let pool = Self {
            base,
            region_layout,
            block_size,
            alignment,
            header_size,
            block_stride,
            num_blocks: config.num_blocks,
            config,
            free_list: FreeList::new(config.num_blocks, config.enable_thread_safety),
            stats: AtomicPoolStats::new(),
            scan_lock: Mutex::new(()),
            created_at: Instant::now(),
        };

        if pool.config.enable_debugging {
            // Stamp every block as free so scans are meaningful from the
            // first instant.
            for index in 0..pool.num_blocks {
                let header = DebugHeader::new(FREE_MAGIC, index as u64, 0);
                // SAFETY: header_ptr stays inside the owned region and the
                // pool is not yet shared.
                unsafe { debug::write_header(pool.header_ptr(index), header) };
            }
        }

        #[cfg(feature = "logging")]
        debug!(
            block_size = pool.block_size,
            num_blocks = pool.num_blocks,
            alignment = pool.alignment,
            debugging = pool.config.enable_debugging,
            total_bytes = total_size,
            "fixed pool created"
        );

        Ok(pool)
    }

    /// Creates a pool with the default configuration for the given geometry
    pub fn new(block_size: usize, num_blocks: usize) -> PoolResult<Self> {
        Self::with_config(PoolConfig::new(block_size, num_blocks))
    }

    /// Creates a pool sized and aligned for values of type `T`
    pub fn for_type<T>(num_blocks: usize) -> PoolResult<Self> {
        let layout = Layout::new::<T>();
        Self::with_config(PoolConfig {
            block_size: layout.size().max(1),
            num_blocks,
            alignment: layout.align(),
            ..PoolConfig::default()
        })
    }

    /// Payload bytes per block (after alignment rounding)
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Alignment of blocks and header placement
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Fixed pool capacity in blocks
    pub fn total_blocks(&self) -> usize {
        self.num_blocks
    }

    /// Blocks currently free
    pub fn free_blocks(&self) -> usize {
        self.free_list.free_count()
    }

    /// Blocks currently issued
    pub fn used_blocks(&self) -> usize {
        self.num_blocks - self.free_blocks()
    }

    /// Total payload capacity in bytes
    pub fn capacity(&self) -> usize {
        self.block_size * self.num_blocks
    }

    /// True when no block is free
    pub fn is_full(&self) -> bool {
        self.free_list.is_exhausted()
    }

    /// True when every block is free
    pub fn is_empty(&self) -> bool {
        self.used_blocks() == 0
    }

    /// Whether the concurrent free-list discipline was requested
    pub fn is_thread_safe(&self) -> bool {
        self.config.enable_thread_safety
    }

    /// The configuration the pool was built with
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Start of the pool region
    ///
    /// With debugging disabled this is also the first payload address.
    pub fn pool_base(&self) -> *const u8 {
        self.base.as_ptr()
    }

    #[inline]
    fn header_ptr(&self, index: usize) -> *mut u8 {
        debug_assert!(index < self.num_blocks);
        // SAFETY: index is in range, so the offset stays inside the region.
        unsafe { self.base.as_ptr().add(index * self.block_stride) }
    }

    #[inline]
    fn payload_ptr(&self, index: usize) -> *mut u8 {
        // SAFETY: as above; the payload begins header_size bytes in.
        unsafe { self.header_ptr(index).add(self.header_size) }
    }

    /// Maps a payload pointer back to its block index
    ///
    /// `None` for null, out-of-range, or off-boundary pointers.
    pub fn block_index_of(&self, ptr: *const u8) -> Option<usize> {
        if ptr.is_null() {
            return None;
        }

        let addr = ptr as usize;
        let first_payload = self.base.as_ptr() as usize + self.header_size;
        let region_end = self.base.as_ptr() as usize + self.region_layout.size();
        if addr < first_payload || addr >= region_end {
            return None;
        }

        let offset = addr - first_payload;
        (offset % self.block_stride == 0).then(|| offset / self.block_stride)
    }

    /// Structural pointer check: block-aligned and pool-resident
    ///
    /// Deliberately state-blind: it answers `true` for a currently-free
    /// block just as for an issued one. Callers that need the state as well
    /// use [`block_is_free`](Self::block_is_free), which inspects the debug
    /// header and is therefore only available with debugging enabled.
    pub fn is_valid_pointer(&self, ptr: *const u8) -> bool {
        self.block_index_of(ptr).is_some()
    }

    /// State of the block behind `ptr` according to its debug header
    ///
    /// `None` when debugging is disabled or the pointer is not a valid
    /// payload pointer.
    pub fn block_is_free(&self, ptr: *const u8) -> Option<bool> {
        if !self.config.enable_debugging {
            return None;
        }
        let index = self.block_index_of(ptr)?;
        // SAFETY: index is validated, header lies inside the region.
        let header = unsafe { debug::read_header(self.header_ptr(index)) };
        Some(header.magic == FREE_MAGIC)
    }

    /// Allocates one block, returning its payload pointer
    ///
    /// `None` when the pool is exhausted; never blocks and never calls the
    /// system allocator. Exhaustion is counted in the statistics.
    pub fn allocate(&self) -> Option<NonNull<u8>> {
        let started = Instant::now();

        let Some(index) = self.free_list.pop() else {
            self.stats.record_allocation_failure();
            return None;
        };

        let payload = self.payload_ptr(index);

        if self.config.zero_on_alloc {
            // SAFETY: payload spans block_size bytes of the owned region and
            // the block is exclusively ours after the pop.
            unsafe { ptr::write_bytes(payload, 0, self.block_size) };
        }

        if self.config.enable_debugging {
            let timestamp_ns = self.created_at.elapsed().as_nanos() as u64;
            let header = DebugHeader::new(ALLOC_MAGIC, index as u64, timestamp_ns);
            // SAFETY: header slot of a block this thread just popped.
            unsafe { debug::write_header(self.header_ptr(index), header) };
        }

        self.stats
            .record_allocation(self.block_size, started.elapsed());

        // SAFETY: payload is derived from the non-null region base.
        Some(unsafe { NonNull::new_unchecked(payload) })
    }

    /// Releases a block previously returned by [`allocate`](Self::allocate)
    ///
    /// Every rejection leaves the pool exactly as it was and bumps the
    /// matching counter:
    ///
    /// # Errors
    /// - [`PoolError::InvalidPointer`] for null, out-of-range or
    ///   off-boundary pointers
    /// - [`PoolError::DoubleFree`] when the block is already free
    /// - [`PoolError::CorruptionDetected`] when the debug header fails
    ///   checksum verification (rejected, never propagated as a crash)
    pub fn deallocate(&self, ptr: *mut u8) -> PoolResult<()> {
        let started = Instant::now();

        let Some(index) = self.block_index_of(ptr) else {
            self.stats.record_invalid_free();
            #[cfg(feature = "logging")]
            warn!(addr = ptr as usize, "rejected free of invalid pointer");
            return Err(PoolError::invalid_pointer(ptr));
        };

        if self.config.enable_debugging {
            // SAFETY: index validated above.
            let header = unsafe { debug::read_header(self.header_ptr(index)) };
            if header.magic == FREE_MAGIC {
                self.stats.record_double_free();
                #[cfg(feature = "logging")]
                warn!(index, "rejected double free");
                return Err(PoolError::double_free(index));
            }
            if !header.checksum_ok() {
                // Not a valid free: suspect state is left untouched.
                self.stats.record_invalid_free();
                #[cfg(feature = "logging")]
                warn!(index, "rejected free of block with corrupt header");
                return Err(PoolError::corruption(index));
            }
        }

        // The state gate: of any number of racing frees for this block,
        // exactly one claim succeeds.
        if !self.free_list.claim(index) {
            self.stats.record_double_free();
            #[cfg(feature = "logging")]
            warn!(index, "rejected double free");
            return Err(PoolError::double_free(index));
        }

        if self.config.poison_on_free {
            // SAFETY: the claim above gives exclusive ownership until push.
            unsafe { debug::poison(self.payload_ptr(index), self.block_size) };
        }

        if self.config.enable_debugging {
            let timestamp_ns = self.created_at.elapsed().as_nanos() as u64;
            let header = DebugHeader::new(FREE_MAGIC, index as u64, timestamp_ns);
            // SAFETY: still exclusively owned; the push below publishes.
            unsafe { debug::write_header(self.header_ptr(index), header) };
        }

        self.free_list.push(index);
        self.stats
            .record_deallocation(self.block_size, started.elapsed());
        Ok(())
    }

    /// Scans for outstanding allocations
    ///
    /// Takes the exclusive scan lock; empty when debugging is disabled.
    /// Each record carries the payload pointer, block index and the age of
    /// the allocation at scan time.
    pub fn find_leaks(&self) -> Vec<LeakRecord> {
        if !self.config.enable_debugging {
            return Vec::new();
        }

        let _guard = self.scan_lock.lock();
        let now_ns = self.created_at.elapsed().as_nanos() as u64;

        (0..self.num_blocks)
            .filter_map(|index| {
                // SAFETY: index stays in range; headers are read atomically.
                let header = unsafe { debug::read_header(self.header_ptr(index)) };
                (header.magic == ALLOC_MAGIC).then(|| LeakRecord {
                    index,
                    // SAFETY: payload pointers derive from the non-null base.
                    ptr: unsafe { NonNull::new_unchecked(self.payload_ptr(index)) },
                    age_ns: now_ns.saturating_sub(header.timestamp_ns),
                })
            })
            .collect()
    }

    /// Counts blocks whose headers fail checksum verification
    ///
    /// Mutates nothing; takes the scan lock; `0` when debugging is disabled.
    /// A block mid-transition on another thread can be observed with a torn
    /// header, so exact results require a quiescent pool.
    pub fn detect_corruption(&self) -> usize {
        if !self.config.enable_debugging {
            return 0;
        }

        let _guard = self.scan_lock.lock();

        (0..self.num_blocks)
            .filter(|&index| {
                // SAFETY: index stays in range; headers are read atomically.
                let header = unsafe { debug::read_header(self.header_ptr(index)) };
                !header.checksum_ok()
            })
            .count()
    }

    /// True iff no header fails checksum verification
    pub fn validate_heap(&self) -> bool {
        self.detect_corruption() == 0
    }

    /// True when the payload behind `ptr` carries the poison pattern
    ///
    /// Used to catch use-after-free reads in testing; `false` for pointers
    /// that do not belong to the pool.
    pub fn is_poisoned(&self, ptr: *const u8) -> bool {
        match self.block_index_of(ptr) {
            // SAFETY: the payload of a validated index lies in the region.
            Some(index) => unsafe {
                debug::is_poisoned(self.payload_ptr(index), self.block_size)
            },
            None => false,
        }
    }

    /// Immutable snapshot of the statistics counters
    pub fn statistics(&self) -> PoolStats {
        self.stats
            .snapshot(self.block_size, self.num_blocks, self.free_blocks())
    }

    /// Resets every statistics counter to zero
    pub fn reset_statistics(&self) {
        self.stats.reset();
    }

    /// Consumes the pool and returns the final leak scan
    ///
    /// `Drop` surfaces leaks through logging; this is the variant for
    /// callers that want the records as data.
    pub fn close(self) -> Vec<LeakRecord> {
        self.find_leaks()
    }
}

impl Drop for FixedPool {
    fn drop(&mut self) {
        if self.config.enable_debugging {
            let leaks = self.find_leaks();
            if !leaks.is_empty() {
                #[cfg(feature = "logging")]
                {
                    warn!(
                        count = leaks.len(),
                        "pool dropped with outstanding allocations"
                    );
                    for leak in &leaks {
                        warn!(
                            index = leak.index,
                            age_ns = leak.age_ns,
                            "block never deallocated"
                        );
                    }
                }
                let _ = leaks;
            }
        }

        // SAFETY: base was allocated with region_layout in with_config and
        // is released exactly once, here.
        unsafe { std::alloc::dealloc(self.base.as_ptr(), self.region_layout) };
    }
}

impl core::fmt::Debug for FixedPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FixedPool")
            .field("block_size", &self.block_size)
            .field("num_blocks", &self.num_blocks)
            .field("alignment", &self.alignment)
            .field("free_blocks", &self.free_blocks())
            .field("debugging", &self.config.enable_debugging)
            .finish_non_exhaustive()
    }
}

// SAFETY: FixedPool is Send.
// - The region is exclusively owned raw memory, released once in Drop
// - FreeList and AtomicPoolStats are plain atomics
// - No thread-local state
unsafe impl Send for FixedPool {}

// SAFETY: FixedPool is Sync.
// - Hot-path shared state is only the tagged head and per-slot atomics,
//   updated by CAS with Acquire/Release pairing
// - A block's payload is touched only by the thread that popped or claimed
//   it; free and issued blocks are disjoint
// - Headers are accessed through atomic field views; whole-pool scans
//   serialize on scan_lock
unsafe impl Sync for FixedPool {}

// SAFETY: the engine hands out properly aligned, exclusive block payloads
// and validates every pointer it takes back.
unsafe impl Allocator for FixedPool {
    /// # Safety
    ///
    /// Caller must not use the returned pointer after the pool is dropped.
    /// Layouts beyond the block geometry are rejected here, not delegated.
    unsafe fn allocate(&self, layout: Layout) -> PoolResult<NonNull<[u8]>> {
        if layout.size() > self.block_size || layout.align() > self.alignment {
            return Err(PoolError::configuration(
                "layout exceeds pool block geometry",
            ));
        }

        if layout.size() == 0 {
            return Ok(NonNull::slice_from_raw_parts(NonNull::dangling(), 0));
        }

        match FixedPool::allocate(self) {
            Some(ptr) => Ok(NonNull::slice_from_raw_parts(ptr, layout.size())),
            None => Err(PoolError::exhausted(self.num_blocks)),
        }
    }

    /// # Safety
    ///
    /// Caller must pass a pointer previously returned by this pool. Invalid
    /// and repeated pointers are rejected (and counted) by the engine.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        let _ = FixedPool::deallocate(self, ptr.as_ptr());
    }

    fn owns(&self, ptr: *const u8) -> bool {
        self.is_valid_pointer(ptr)
    }

    fn max_allocation_size(&self) -> usize {
        self.block_size
    }
}

impl MemoryUsage for FixedPool {
    fn used_memory(&self) -> usize {
        self.used_blocks() * self.block_size
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.free_blocks() * self.block_size)
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.capacity())
    }
}

impl StatisticsProvider for FixedPool {
    fn statistics(&self) -> PoolStats {
        FixedPool::statistics(self)
    }

    fn reset_statistics(&self) {
        FixedPool::reset_statistics(self);
    }
}
