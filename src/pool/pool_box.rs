//! Scoped ownership handle for pool-allocated values

use core::alloc::Layout;
use core::ptr::{self, NonNull};

use super::allocator::FixedPool;
use crate::error::{PoolError, PoolResult};

/// RAII handle for a single pool block
///
/// Acquires a block on construction and releases it through `deallocate` on
/// every exit path, including early returns in the caller and
/// [`into_inner`](PoolBox::into_inner). Non-copyable, transferable by move,
/// and lifetime-bound to the owning pool so it can never outlive it.
pub struct PoolBox<'pool, T> {
    ptr: NonNull<T>,
    pool: &'pool FixedPool,
}

impl<'pool, T> PoolBox<'pool, T> {
    /// Moves `value` into a block allocated from `pool`
    ///
    /// # Errors
    /// - [`PoolError::Configuration`] when `T` does not fit the pool's block
    ///   geometry
    /// - [`PoolError::Exhausted`] when no block is free
    #[must_use = "allocated value must be used"]
    pub fn new_in(value: T, pool: &'pool FixedPool) -> PoolResult<Self> {
        let layout = Layout::new::<T>();
        if layout.size() > pool.block_size() || layout.align() > pool.alignment() {
            return Err(PoolError::configuration(
                "value layout exceeds pool block geometry",
            ));
        }

        let ptr = pool
            .allocate()
            .ok_or_else(|| PoolError::exhausted(pool.total_blocks()))?
            .cast::<T>();

        // SAFETY: the block is exclusively ours, at least size_of::<T>()
        // bytes, and payload alignment satisfies align_of::<T>() (checked
        // against the pool alignment above). write moves without dropping.
        unsafe { ptr.as_ptr().write(value) };

        Ok(Self { ptr, pool })
    }

    /// Shared reference to the contained value
    pub fn get(&self) -> &T {
        // SAFETY: ptr points at an initialized T owned by this handle;
        // the lifetime is tied to &self.
        unsafe { self.ptr.as_ref() }
    }

    /// Mutable reference to the contained value
    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY: &mut self guarantees exclusive access.
        unsafe { self.ptr.as_mut() }
    }

    /// Consumes the handle and returns the contained value
    ///
    /// The block returns to the pool; the value is moved out, not dropped.
    #[must_use]
    pub fn into_inner(self) -> T {
        // SAFETY: ptr points at an initialized T; read performs a bitwise
        // move and mem::forget below prevents a second drop.
        let value = unsafe { ptr::read(self.ptr.as_ptr()) };

        let _ = self.pool.deallocate(self.ptr.as_ptr().cast());
        core::mem::forget(self);

        value
    }
}

impl<T> core::ops::Deref for PoolBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.get()
    }
}

impl<T> core::ops::DerefMut for PoolBox<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.get_mut()
    }
}

impl<T> Drop for PoolBox<'_, T> {
    fn drop(&mut self) {
        // SAFETY: ptr points at an initialized T this handle owns
        // exclusively; after the destructor runs the raw block goes back to
        // the pool that issued it.
        unsafe { ptr::drop_in_place(self.ptr.as_ptr()) };
        let _ = self.pool.deallocate(self.ptr.as_ptr().cast());
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for PoolBox<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("PoolBox").field(self.get()).finish()
    }
}
