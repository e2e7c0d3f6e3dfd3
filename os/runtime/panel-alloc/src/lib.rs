//! # Display runtime pool allocator
//!
//! A fixed-size pool allocator for bare-metal display firmware. The pool owns
//! one contiguous arena (internal SRAM, a [`StaticArena`], or external SDRAM)
//! and hands out aligned blocks from it, first fit.
//!
//! ## Layout
//!
//! ```text
//!  arena
//! ┌────────┬───────────┬────────┬───────────┬────────┬──────────────────┐
//! │ header │  payload  │ header │  payload  │ header │     payload      │
//! │ (used) │           │ (free) │           │ (free) │                  │
//! └────────┴───────────┴───┬────┴───────────┴───▲────┴──────────────────┘
//!                          └──── next (offset) ─┘
//! ```
//!
//! Every block starts with a 16-byte header ([`HEADER_SIZE`]) holding the
//! payload size, a sentinel ([`MAGIC_FREE`] / [`MAGIC_USED`]) and, for free
//! blocks, the offset of the next free block. Headers are addressed by
//! offset from the arena base and every access is bounds checked, so a
//! corrupted link is reported instead of followed out of the arena.
//!
//! ## Behaviour
//!
//! * Sizes round up to [`DEFAULT_ALIGN`]; alignments below it are raised.
//! * Freed blocks go to the head of the free list. Neighbours are **not**
//!   merged, so mixed-size workloads fragment. [`MemPool::stats`] reports the
//!   largest free block to make that visible.
//! * Freeing a pointer that is not a live allocation (double free, stray
//!   pointer) leaves the pool untouched; see [`CorruptionPolicy`].
//! * All operations run inside a critical section from `panel-sync`.
//!
//! ```
//! use panel_alloc::{MemPool, StaticArena};
//! use panel_sync::RawSpin;
//!
//! static ARENA: StaticArena<2048> = StaticArena::new();
//! static POOL: MemPool<RawSpin> = MemPool::new();
//!
//! POOL.init_static(ARENA.take().unwrap()).unwrap();
//!
//! let line = POOL.alloc_aligned(640, 32).unwrap();
//! assert_eq!(line.as_ptr().addr() % 32, 0);
//! POOL.free(line.as_ptr());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod arena;
mod buffer;
mod error;
mod free_list;
mod header;
mod pool;
mod static_arena;
#[cfg(feature = "system-heap")]
mod system_heap;

pub use buffer::BufferAlloc;
pub use error::PoolError;
pub use header::{HEADER_SIZE, MAGIC_FREE, MAGIC_USED};
pub use pool::{CorruptionPolicy, MemPool, PoolStats};
pub use static_arena::{EXTERNAL_SDRAM_BASE, StaticArena};
#[cfg(feature = "system-heap")]
pub use system_heap::SystemHeap;

/// Alignment of every payload and granularity of every size.
pub const DEFAULT_ALIGN: usize = 16;

/// Smallest arena that can hold one block.
pub const MIN_ARENA_SIZE: usize = HEADER_SIZE + DEFAULT_ALIGN;

/// Rounds `value` up to the next multiple of `align` (a power of two).
///
/// Returns `None` on overflow.
#[inline]
#[must_use]
pub const fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_power_of_two() {
        assert_eq!(align_up(0, 16), Some(0));
        assert_eq!(align_up(1, 16), Some(16));
        assert_eq!(align_up(16, 16), Some(16));
        assert_eq!(align_up(17, 32), Some(32));
        assert_eq!(align_up(usize::MAX, 16), None);
    }
}
