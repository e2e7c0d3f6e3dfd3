use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

/// Base address of the external SDRAM bank on the reference board (FMC bank 5).
pub const EXTERNAL_SDRAM_BASE: usize = 0xC000_0000;

/// Statically reserved pool storage.
///
/// The storage is aligned for framebuffers, so a pool built on it can hand
/// out 32-byte aligned blocks without carving.
///
/// ```
/// use panel_alloc::StaticArena;
///
/// static ARENA: StaticArena<1024> = StaticArena::new();
///
/// let bytes = ARENA.take().unwrap();
/// assert_eq!(bytes.len(), 1024);
/// assert!(ARENA.take().is_none());
/// ```
#[repr(C, align(32))]
pub struct StaticArena<const N: usize> {
    bytes: UnsafeCell<[u8; N]>,
    taken: AtomicBool,
}

// Safety: the bytes are only reachable through the single `&mut` that
// `take` hands out.
unsafe impl<const N: usize> Sync for StaticArena<N> {}

impl<const N: usize> StaticArena<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: UnsafeCell::new([0; N]),
            taken: AtomicBool::new(false),
        }
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Hands out the storage, once.
    pub fn take(&'static self) -> Option<&'static mut [u8]> {
        if self.taken.swap(true, Ordering::AcqRel) {
            return None;
        }
        // SAFETY: the flag guarantees this is the only borrow ever created.
        Some(unsafe { &mut *self.bytes.get() })
    }
}

impl<const N: usize> Default for StaticArena<N> {
    fn default() -> Self {
        Self::new()
    }
}
