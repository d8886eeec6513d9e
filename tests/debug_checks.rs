//! Double-free, invalid-pointer, poisoning, leak and corruption tests

use blockpool::pool::POISON_PATTERN;
use blockpool::{FixedPool, PoolConfig, PoolError};

fn debug_pool(block_size: usize, num_blocks: usize) -> FixedPool {
    FixedPool::with_config(PoolConfig::debug(block_size, num_blocks)).unwrap()
}

#[test]
fn double_free_is_rejected_and_counted_once() {
    let pool = debug_pool(32, 3);

    let ptr = pool.allocate().unwrap().as_ptr();
    let _keep = pool.allocate().unwrap();

    pool.deallocate(ptr).unwrap();
    assert_eq!(pool.free_blocks(), 2);

    let stats_before = pool.statistics();
    let result = pool.deallocate(ptr);
    assert!(matches!(result, Err(PoolError::DoubleFree { .. })));

    let stats = pool.statistics();
    assert_eq!(
        stats.double_free_attempts,
        stats_before.double_free_attempts + 1
    );
    // The rejected call is a no-op on pool state.
    assert_eq!(stats.deallocations, stats_before.deallocations);
    assert_eq!(pool.free_blocks(), 2);
    assert_eq!(pool.used_blocks(), 1);
}

#[test]
fn double_free_is_caught_without_debug_headers_too() {
    // The free list's state gate rejects double frees even when no header
    // exists to consult.
    let pool = FixedPool::new(32, 2).unwrap();

    let ptr = pool.allocate().unwrap().as_ptr();
    pool.deallocate(ptr).unwrap();

    assert!(matches!(
        pool.deallocate(ptr),
        Err(PoolError::DoubleFree { .. })
    ));
    assert_eq!(pool.statistics().double_free_attempts, 1);
    assert_eq!(pool.free_blocks(), 2);
}

#[test]
fn invalid_pointers_are_rejected_without_mutation() {
    let pool = debug_pool(32, 3);

    assert!(!pool.is_valid_pointer(std::ptr::null()));

    // A pointer from an unrelated region is structurally invalid.
    let mut unrelated = vec![0u8; 32];
    assert!(!pool.is_valid_pointer(unrelated.as_ptr()));

    let result = pool.deallocate(std::ptr::null_mut());
    assert!(matches!(result, Err(PoolError::InvalidPointer { .. })));
    let result = pool.deallocate(unrelated.as_mut_ptr());
    assert!(matches!(result, Err(PoolError::InvalidPointer { .. })));

    // An interior pointer is in range but off the block boundary.
    let ptr = pool.allocate().unwrap().as_ptr();
    let interior = unsafe { ptr.add(1) };
    assert!(!pool.is_valid_pointer(interior));
    assert!(matches!(
        pool.deallocate(interior),
        Err(PoolError::InvalidPointer { .. })
    ));

    let stats = pool.statistics();
    assert_eq!(stats.invalid_free_attempts, 3);
    assert_eq!(stats.double_free_attempts, 0);
    assert_eq!(pool.used_blocks(), 1);

    pool.deallocate(ptr).unwrap();
}

#[test]
fn structural_validity_is_orthogonal_to_block_state() {
    let pool = debug_pool(32, 3);

    let ptr = pool.allocate().unwrap().as_ptr();
    assert!(pool.is_valid_pointer(ptr));
    assert_eq!(pool.block_is_free(ptr), Some(false));

    pool.deallocate(ptr).unwrap();

    // Still block-aligned and pool-resident...
    assert!(pool.is_valid_pointer(ptr));
    // ...but the header now reads the block as free.
    assert_eq!(pool.block_is_free(ptr), Some(true));
}

#[test]
fn block_state_is_unavailable_without_debugging() {
    let pool = FixedPool::new(32, 2).unwrap();
    let ptr = pool.allocate().unwrap().as_ptr();

    assert!(pool.is_valid_pointer(ptr));
    assert_eq!(pool.block_is_free(ptr), None);

    pool.deallocate(ptr).unwrap();
}

#[test]
fn freed_payload_is_poisoned_until_reissue() {
    let pool = debug_pool(64, 2);

    let ptr = pool.allocate().unwrap().as_ptr();
    unsafe { std::ptr::write_bytes(ptr, 0xAB, 64) };

    pool.deallocate(ptr).unwrap();

    // Caller data is gone; the poison pattern is in its place. The pool
    // still owns the region, so reading through the stale pointer stays
    // in-bounds for this check.
    assert!(pool.is_poisoned(ptr));
    let bytes = unsafe { std::slice::from_raw_parts(ptr, 64) };
    assert!(bytes.iter().all(|&b| b == POISON_PATTERN));

    // Reissue with zero_on_alloc wipes the poison again.
    let reissued = pool.allocate().unwrap();
    assert_eq!(reissued.as_ptr(), ptr);
    let bytes = unsafe { std::slice::from_raw_parts(reissued.as_ptr(), 64) };
    assert!(bytes.iter().all(|&b| b == 0));

    pool.deallocate(reissued.as_ptr()).unwrap();
}

#[test]
fn zero_on_alloc_clears_previous_contents() {
    let config = PoolConfig {
        zero_on_alloc: true,
        ..PoolConfig::new(32, 1)
    };
    let pool = FixedPool::with_config(config).unwrap();

    let ptr = pool.allocate().unwrap().as_ptr();
    unsafe { std::ptr::write_bytes(ptr, 0x77, 32) };
    pool.deallocate(ptr).unwrap();

    let ptr = pool.allocate().unwrap().as_ptr();
    let bytes = unsafe { std::slice::from_raw_parts(ptr, 32) };
    assert!(bytes.iter().all(|&b| b == 0));
    pool.deallocate(ptr).unwrap();
}

#[test]
fn leak_scan_reports_outstanding_blocks() {
    let pool = debug_pool(32, 4);
    assert!(pool.find_leaks().is_empty());

    let a = pool.allocate().unwrap();
    let b = pool.allocate().unwrap();

    let leaks = pool.find_leaks();
    assert_eq!(leaks.len(), 2);
    let leaked: Vec<*mut u8> = leaks.iter().map(|l| l.ptr.as_ptr()).collect();
    assert!(leaked.contains(&a.as_ptr()));
    assert!(leaked.contains(&b.as_ptr()));

    pool.deallocate(a.as_ptr()).unwrap();
    assert_eq!(pool.find_leaks().len(), 1);

    pool.deallocate(b.as_ptr()).unwrap();
    assert!(pool.find_leaks().is_empty());
}

#[test]
fn close_returns_the_final_leak_scan() {
    let pool = debug_pool(32, 4);

    let _leaked = pool.allocate().unwrap();
    let kept_index = pool.block_index_of(_leaked.as_ptr()).unwrap();

    let leaks = pool.close();
    assert_eq!(leaks.len(), 1);
    assert_eq!(leaks[0].index, kept_index);
}

#[test]
fn leak_scan_is_empty_without_debugging() {
    let pool = FixedPool::new(32, 2).unwrap();
    let _held = pool.allocate().unwrap();
    assert!(pool.find_leaks().is_empty());
    assert_eq!(pool.detect_corruption(), 0);
    assert!(pool.validate_heap());
}

#[test]
fn corruption_is_detected_and_the_free_rejected() {
    let pool = debug_pool(32, 3);
    assert!(pool.validate_heap());

    let ptr = pool.allocate().unwrap().as_ptr();

    // Simulate a header smash: a buffer underrun flips bytes right before
    // the payload, where the checksum field lives.
    unsafe { std::ptr::write_bytes(ptr.sub(8), 0x5A, 8) };

    assert_eq!(pool.detect_corruption(), 1);
    assert!(!pool.validate_heap());

    let stats_before = pool.statistics();
    let result = pool.deallocate(ptr);
    assert!(matches!(result, Err(PoolError::CorruptionDetected { .. })));

    let stats = pool.statistics();
    assert_eq!(
        stats.invalid_free_attempts,
        stats_before.invalid_free_attempts + 1
    );
    assert_eq!(stats.double_free_attempts, 0);
    // The suspect block stays issued; nothing was pushed to the free list.
    assert_eq!(pool.used_blocks(), 1);
}

#[test]
fn headers_survive_full_payload_writes() {
    // Writing every payload byte must not disturb any header.
    let pool = debug_pool(48, 4);
    let mut held = Vec::new();

    for fill in 0..4u8 {
        let ptr = pool.allocate().unwrap();
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), fill, 48) };
        held.push(ptr);
    }

    assert!(pool.validate_heap());
    assert_eq!(pool.detect_corruption(), 0);

    for ptr in held {
        pool.deallocate(ptr.as_ptr()).unwrap();
    }
    assert!(pool.validate_heap());
}
