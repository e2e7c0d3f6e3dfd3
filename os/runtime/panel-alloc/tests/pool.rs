use panel_alloc::{
    CorruptionPolicy, DEFAULT_ALIGN, HEADER_SIZE, MemPool, PoolError, PoolStats,
};
use panel_sync::{NoMask, RawIrq, RawSpin};
use std::ptr::{self, NonNull};
use std::sync::Barrier;
use std::thread;

#[repr(C, align(256))]
struct Backing([u8; 64 * 1024]);

fn backing() -> Box<Backing> {
    Box::new(Backing([0xAA; 64 * 1024]))
}

/// A pool over the first `len` bytes of `b`, starting `skew` bytes in.
fn pool_over(b: &mut Backing, skew: usize, len: usize) -> MemPool<RawSpin> {
    let pool = MemPool::new();
    unsafe { pool.init(b.0[skew..].as_mut_ptr(), len) }.unwrap();
    pool
}

fn addr(p: NonNull<u8>) -> usize {
    p.as_ptr().addr()
}

#[test]
fn uninitialized_pool_refuses_work() {
    let pool: MemPool<RawSpin> = MemPool::new();
    assert!(!pool.is_initialized());
    assert!(pool.alloc(16).is_none());
    assert_eq!(pool.try_alloc_aligned(16, 16), Err(PoolError::Uninitialized));
    assert!(pool.calloc(2, 8).is_none());

    let mut x = 0u8;
    pool.free(&raw mut x);
    assert_eq!(pool.try_free(&raw mut x), Err(PoolError::Uninitialized));
    assert_eq!(pool.stats(), PoolStats::default());
}

#[test]
fn init_rejects_null_and_tiny_arenas() {
    let mut b = backing();
    let pool: MemPool<RawSpin> = MemPool::new();

    let err = unsafe { pool.init(ptr::null_mut(), 1024) }.unwrap_err();
    assert!(matches!(err, PoolError::InvalidArgument(_)));

    let err = unsafe { pool.init(b.0.as_mut_ptr(), HEADER_SIZE + DEFAULT_ALIGN - 1) }.unwrap_err();
    assert!(matches!(err, PoolError::InvalidArgument(_)));
    assert!(!pool.is_initialized());

    // A failed init does not consume the pool.
    unsafe { pool.init(b.0.as_mut_ptr(), HEADER_SIZE + DEFAULT_ALIGN) }.unwrap();
    assert!(pool.alloc(DEFAULT_ALIGN).is_some());
}

#[test]
fn init_is_idempotent() {
    let mut b = backing();
    let pool = pool_over(&mut b, 0, 1024);
    let kept = pool.alloc(64).unwrap();

    unsafe { pool.init(b.0[4096..].as_mut_ptr(), 8192) }.unwrap();
    let stats = pool.stats();
    assert_eq!(stats.pool_size, 1024);
    assert_eq!(stats.allocated_blocks, 1);
    assert_eq!(pool.used_bytes(), 64 + HEADER_SIZE);
    pool.free(kept.as_ptr());
}

#[test]
fn init_external_uses_the_given_address() {
    let mut b = backing();
    let base = b.0.as_mut_ptr().expose_provenance();
    let pool: MemPool<RawSpin> = MemPool::new();
    unsafe { pool.init_external(base, 4096) }.unwrap();

    let p = pool.alloc(32).unwrap();
    assert_eq!(addr(p), base + HEADER_SIZE);
    pool.free(p.as_ptr());
}

#[test]
fn freshly_initialized_pool_is_all_free() {
    let mut b = backing();
    let pool = pool_over(&mut b, 0, 4096);
    assert_eq!(pool.free_bytes(), 4096);
    assert_eq!(pool.used_bytes(), 0);
    assert_eq!(pool.block_count(), 0);
}

#[test]
fn reference_scenario_reuses_head_block() {
    let mut b = backing();
    let pool = pool_over(&mut b, 0, 64);

    let first = pool.alloc_aligned(16, 16).unwrap();
    let second = pool.alloc_aligned(16, 16).unwrap();
    assert_ne!(first, second);

    pool.free(first.as_ptr());
    assert_eq!(pool.used_bytes(), 16 + HEADER_SIZE);

    let again = pool.alloc(16).unwrap();
    assert_eq!(again, first);
}

#[test]
fn every_alignment_is_honoured() {
    let mut b = backing();
    // Skewed so that large alignments have to carve.
    let pool = pool_over(&mut b, 16, 16 * 1024);

    let mut blocks = Vec::new();
    for (i, align) in [1usize, 2, 4, 8, 16, 32, 64, 128, 256, 512].into_iter().enumerate() {
        let p = pool.alloc_aligned(24, align).unwrap();
        assert_eq!(addr(p) % align.max(DEFAULT_ALIGN), 0, "align {align}");
        unsafe { p.as_ptr().write_bytes(u8::try_from(i).unwrap(), 24) };
        blocks.push((i, p));
    }

    // No two blocks overlap.
    for (i, p) in &blocks {
        let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), 24) };
        assert!(bytes.iter().all(|b| usize::from(*b) == *i));
    }

    for (_, p) in blocks {
        pool.free(p.as_ptr());
    }
    assert_eq!(pool.used_bytes(), 0);
    assert_eq!(pool.block_count(), 0);
}

#[test]
fn non_power_of_two_alignment_falls_back() {
    let mut b = backing();
    let pool = pool_over(&mut b, 0, 1024);
    for align in [0, 3, 24, 100] {
        let p = pool.alloc_aligned(8, align).unwrap();
        assert_eq!(addr(p) % DEFAULT_ALIGN, 0);
        pool.free(p.as_ptr());
    }
}

#[test]
fn zero_size_is_rejected() {
    let mut b = backing();
    let pool = pool_over(&mut b, 0, 1024);
    assert!(pool.alloc(0).is_none());
    assert!(matches!(pool.try_alloc_aligned(0, 16), Err(PoolError::InvalidArgument(_))));
    assert_eq!(pool.used_bytes(), 0);
}

#[test]
fn counters_return_to_start_after_freeing_everything() {
    let mut b = backing();
    let pool = pool_over(&mut b, 0, 8192);
    let sizes = [1, 17, 100, 33, 512, 16, 250];

    let blocks: Vec<_> = sizes.iter().map(|s| pool.alloc(*s).unwrap()).collect();
    assert_eq!(pool.block_count(), sizes.len());
    assert!(pool.used_bytes() >= sizes.iter().sum::<usize>() + sizes.len() * HEADER_SIZE);

    for p in blocks.iter().rev() {
        pool.free(p.as_ptr());
    }
    assert_eq!(pool.free_bytes(), 8192);
    assert_eq!(pool.used_bytes(), 0);
    assert_eq!(pool.block_count(), 0);
}

#[test]
fn double_free_leaves_pool_untouched() {
    let mut b = backing();
    let pool = pool_over(&mut b, 0, 1024);
    let p = pool.alloc(40).unwrap();
    let _q = pool.alloc(40).unwrap();

    pool.free(p.as_ptr());
    let before = pool.stats();

    pool.free(p.as_ptr());
    assert_eq!(pool.stats(), before);
    assert!(matches!(
        pool.try_free(p.as_ptr()),
        Err(PoolError::CorruptionDetected { .. })
    ));
    assert_eq!(pool.stats(), before);
}

#[test]
fn foreign_and_interior_pointers_are_rejected() {
    let mut b = backing();
    let pool = pool_over(&mut b, 0, 1024);
    let p = pool.alloc(64).unwrap();
    let before = pool.stats();

    let mut outside = [0u8; 8];
    assert!(matches!(
        pool.try_free(outside.as_mut_ptr()),
        Err(PoolError::ForeignPointer { .. })
    ));
    pool.free(outside.as_mut_ptr());

    // Pointing into the middle of a payload finds no valid header.
    let interior = unsafe { p.as_ptr().add(8) };
    assert!(pool.try_free(interior).is_err());

    assert!(pool.try_free(ptr::null_mut()).is_ok());
    assert_eq!(pool.stats(), before);
}

#[test]
#[should_panic(expected = "invalid free")]
fn panic_policy_escalates_invalid_free() {
    let mut b = backing();
    let pool: MemPool<RawSpin> = MemPool::with_policy(CorruptionPolicy::Panic);
    unsafe { pool.init(b.0.as_mut_ptr(), 1024) }.unwrap();
    let p = pool.alloc(16).unwrap();
    pool.free(p.as_ptr());
    pool.free(p.as_ptr());
}

#[test]
fn calloc_zeroes_the_block() {
    let mut b = backing();
    let pool = pool_over(&mut b, 0, 1024);
    let p = pool.calloc(10, 7).unwrap();
    let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), 70) };
    assert!(bytes.iter().all(|b| *b == 0));
}

#[test]
fn calloc_overflow_is_an_argument_error() {
    let mut b = backing();
    let pool = pool_over(&mut b, 0, 1024);
    assert!(pool.calloc(usize::MAX, 2).is_none());
    assert!(matches!(
        pool.try_calloc(usize::MAX / 2, 3),
        Err(PoolError::InvalidArgument(_))
    ));
    assert_eq!(pool.used_bytes(), 0);
}

#[test]
fn exhaustion_reports_out_of_memory() {
    let mut b = backing();
    let pool = pool_over(&mut b, 0, 1024);

    let mut blocks = Vec::new();
    while let Some(p) = pool.alloc(48) {
        blocks.push(p);
    }
    // 1024 / (48 + 16) blocks fit exactly.
    assert_eq!(blocks.len(), 16);
    assert_eq!(pool.free_bytes(), 0);
    assert!(matches!(
        pool.try_alloc_aligned(16, 16),
        Err(PoolError::OutOfMemory { .. })
    ));
    assert!(pool.alloc(2048).is_none());

    for p in blocks {
        pool.free(p.as_ptr());
    }
    assert_eq!(pool.free_bytes(), 1024);
}

#[test]
fn repeated_alloc_free_of_one_size_is_stable() {
    let mut b = backing();
    let pool = pool_over(&mut b, 0, 1024);
    let first = pool.alloc(100).unwrap();
    pool.free(first.as_ptr());

    for _ in 0..10_000 {
        let p = pool.alloc(100).unwrap();
        assert_eq!(p, first);
        pool.free(p.as_ptr());
    }
    assert_eq!(pool.stats().free_blocks, 2);
}

#[test]
fn freed_neighbours_are_not_merged() {
    let mut b = backing();
    let pool = pool_over(&mut b, 0, 256);

    let blocks: Vec<_> = (0..4).map(|_| pool.alloc(48).unwrap()).collect();
    assert_eq!(pool.free_bytes(), 0);
    for p in &blocks {
        pool.free(p.as_ptr());
    }

    // Everything is free again, yet no single block holds 100 bytes.
    let stats = pool.stats();
    assert_eq!(stats.free_bytes, 256);
    assert_eq!(stats.free_blocks, 4);
    assert_eq!(stats.largest_free_block, 48);
    assert!(matches!(
        pool.try_alloc_aligned(100, 16),
        Err(PoolError::OutOfMemory { .. })
    ));
}

#[test]
fn concurrent_alloc_free_keeps_blocks_disjoint() {
    const THREADS: usize = 8;
    const ITERS: usize = 2_000;
    const SIZE: usize = 48;

    let mut b = backing();
    let pool: MemPool<RawIrq<NoMask>> = MemPool::new();
    unsafe { pool.init(b.0.as_mut_ptr(), 16 * 1024) }.unwrap();
    let start = Barrier::new(THREADS);

    thread::scope(|s| {
        for t in 0..THREADS {
            let pool = &pool;
            let start = &start;
            s.spawn(move || {
                let tag = u8::try_from(t).unwrap();
                start.wait();
                for _ in 0..ITERS {
                    let p = pool.alloc(SIZE).unwrap();
                    unsafe { p.as_ptr().write_bytes(tag, SIZE) };
                    thread::yield_now();
                    let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), SIZE) };
                    assert!(bytes.iter().all(|b| *b == tag), "block shared between threads");
                    pool.free(p.as_ptr());
                }
            });
        }
    });

    let stats = pool.stats();
    assert_eq!(stats.used_bytes, 0);
    assert_eq!(stats.allocated_blocks, 0);
    assert!(stats.free_blocks <= THREADS + 1);
}
