use crate::error::PoolError;
use crate::free_list::{FreeList, Init};
use core::ptr::{self, NonNull};
use log::{debug, info, trace, warn};
use panel_sync::{ConstInit, Exclusive, NativeMask, RawIrq, RawLock, RawUnlock};

/// What [`MemPool::free`] does with a pointer it cannot validate.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum CorruptionPolicy {
    /// Drop the request and log a warning.
    #[default]
    Ignore,
    /// Panic; for builds that have a fault-reporting channel.
    Panic,
}

/// Snapshot of the pool counters, taken in one critical section.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub pool_size: usize,
    pub free_bytes: usize,
    pub used_bytes: usize,
    /// Blocks currently handed out.
    pub allocated_blocks: usize,
    /// Blocks on the free list.
    pub free_blocks: usize,
    /// Largest payload a single free block offers. Without coalescing this
    /// can be far below `free_bytes`.
    pub largest_free_block: usize,
}

/// A fixed-arena pool allocator, safe to call from task and interrupt
/// context.
///
/// Every operation runs inside the critical section provided by `R`; the
/// default masks interrupts on bare-metal targets. Operations are not
/// reentrant: a handler must not interrupt an in-progress pool call on the
/// same core, which masking guarantees.
///
/// ```
/// use panel_alloc::{MemPool, StaticArena};
/// use panel_sync::RawSpin;
///
/// static ARENA: StaticArena<4096> = StaticArena::new();
/// static POOL: MemPool<RawSpin> = MemPool::new();
///
/// POOL.init_static(ARENA.take().unwrap()).unwrap();
/// let p = POOL.alloc(100).unwrap();
/// assert!(POOL.used_bytes() >= 100);
/// POOL.free(p.as_ptr());
/// assert_eq!(POOL.used_bytes(), 0);
/// ```
pub struct MemPool<R = RawIrq<NativeMask>> {
    list: Exclusive<FreeList, R>,
    policy: CorruptionPolicy,
}

impl<R: ConstInit> MemPool<R> {
    /// An uninitialized pool that ignores invalid frees.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_policy(CorruptionPolicy::Ignore)
    }

    #[must_use]
    pub const fn with_policy(policy: CorruptionPolicy) -> Self {
        Self {
            list: Exclusive::new(FreeList::new()),
            policy,
        }
    }
}

impl<R: ConstInit> Default for MemPool<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> MemPool<R>
where
    R: RawLock + RawUnlock,
{
    /// Installs `[start, start + size)` as the pool's arena.
    ///
    /// The first successful call wins; later calls return `Ok(())` and leave
    /// the pool untouched.
    ///
    /// # Errors
    /// [`PoolError::InvalidArgument`] if `start` is null, or `size` cannot
    /// hold one header plus [`DEFAULT_ALIGN`](crate::DEFAULT_ALIGN) bytes, or
    /// exceeds `u32::MAX`.
    ///
    /// # Safety
    /// The region must be valid for reads and writes and used by nothing but
    /// this pool for the pool's whole lifetime.
    pub unsafe fn init(&self, start: *mut u8, size: usize) -> Result<(), PoolError> {
        let start = NonNull::new(start).ok_or(PoolError::InvalidArgument("arena start is null"))?;
        let outcome = self.list.with(|list| unsafe { list.init(start, size) })?;
        match outcome {
            Init::Fresh => info!("pool: {size} byte arena at {:#x}", start.as_ptr().addr()),
            Init::AlreadyInitialized => debug!("pool: already initialized, keeping first arena"),
        }
        Ok(())
    }

    /// Installs a statically owned arena, e.g. from a [`StaticArena`](crate::StaticArena).
    ///
    /// # Errors
    /// As [`init`](Self::init).
    pub fn init_static(&self, arena: &'static mut [u8]) -> Result<(), PoolError> {
        // SAFETY: the exclusive 'static borrow is never released.
        unsafe { self.init(arena.as_mut_ptr(), arena.len()) }
    }

    /// Installs an arena at a fixed physical address, such as external SDRAM
    /// behind the memory controller.
    ///
    /// # Errors
    /// As [`init`](Self::init).
    ///
    /// # Safety
    /// `[base, base + size)` must be mapped, writable, and unused by anything
    /// else for the pool's whole lifetime.
    pub unsafe fn init_external(&self, base: usize, size: usize) -> Result<(), PoolError> {
        unsafe { self.init(ptr::with_exposed_provenance_mut(base), size) }
    }

    pub fn is_initialized(&self) -> bool {
        self.list.with(|list| list.is_initialized())
    }

    /// Allocates `size` bytes at the default alignment.
    pub fn alloc(&self, size: usize) -> Option<NonNull<u8>> {
        self.alloc_aligned(size, crate::DEFAULT_ALIGN)
    }

    /// Allocates `size` bytes aligned to `align`. A zero or
    /// non-power-of-two `align` falls back to the default alignment.
    pub fn alloc_aligned(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        self.try_alloc_aligned(size, align).ok()
    }

    /// As [`alloc_aligned`](Self::alloc_aligned), reporting why nothing was
    /// allocated.
    ///
    /// # Errors
    /// [`PoolError::Uninitialized`], [`PoolError::InvalidArgument`] for
    /// `size == 0`, [`PoolError::OutOfMemory`] when no free block fits, and
    /// [`PoolError::CorruptionDetected`] if the free list is damaged.
    pub fn try_alloc_aligned(&self, size: usize, align: usize) -> Result<NonNull<u8>, PoolError> {
        let result = self.list.with(|list| list.allocate(size, align));
        match &result {
            Ok(p) => trace!("pool: alloc {size}@{align} -> {:#x}", p.as_ptr().addr()),
            Err(e) => debug!("pool: alloc {size}@{align} failed: {e}"),
        }
        result
    }

    /// Allocates `count * size` zeroed bytes.
    pub fn calloc(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
        self.try_calloc(count, size).ok()
    }

    /// # Errors
    /// [`PoolError::InvalidArgument`] if `count * size` overflows, otherwise
    /// as [`try_alloc_aligned`](Self::try_alloc_aligned).
    pub fn try_calloc(&self, count: usize, size: usize) -> Result<NonNull<u8>, PoolError> {
        let total = count
            .checked_mul(size)
            .ok_or(PoolError::InvalidArgument("calloc size overflows"))?;
        let p = self.try_alloc_aligned(total, crate::DEFAULT_ALIGN)?;
        // SAFETY: the block was just handed out and holds at least `total` bytes.
        unsafe { ptr::write_bytes(p.as_ptr(), 0, total) };
        Ok(p)
    }

    /// Returns a block to the pool.
    ///
    /// Null pointers and calls on an uninitialized pool do nothing. Pointers
    /// that are not live allocations of this pool (double frees, strays) are
    /// handled per the pool's [`CorruptionPolicy`].
    ///
    /// # Panics
    /// Only with [`CorruptionPolicy::Panic`] and an invalid pointer.
    pub fn free(&self, ptr: *mut u8) {
        match self.try_free(ptr) {
            Ok(()) | Err(PoolError::Uninitialized) => {}
            Err(e) => match self.policy {
                CorruptionPolicy::Ignore => warn!("pool: ignoring free of {:#x}: {e}", ptr.addr()),
                CorruptionPolicy::Panic => panic!("pool: invalid free of {:#x}: {e}", ptr.addr()),
            },
        }
    }

    /// As [`free`](Self::free), reporting rejected pointers instead of
    /// applying the policy.
    ///
    /// # Errors
    /// [`PoolError::Uninitialized`], [`PoolError::ForeignPointer`] for
    /// pointers outside the arena, [`PoolError::CorruptionDetected`] when the
    /// header does not carry the allocated sentinel.
    pub fn try_free(&self, ptr: *mut u8) -> Result<(), PoolError> {
        if ptr.is_null() {
            return Ok(());
        }
        let size = self.list.with(|list| list.release(ptr))?;
        trace!("pool: free {:#x} ({size} bytes)", ptr.addr());
        Ok(())
    }

    /// Bytes available for allocation, headers of free blocks included.
    pub fn free_bytes(&self) -> usize {
        self.list.with(|list| list.free_size())
    }

    /// Payload plus header bytes of all allocated blocks.
    pub fn used_bytes(&self) -> usize {
        self.list.with(|list| list.used_size())
    }

    pub fn block_count(&self) -> usize {
        self.list.with(|list| list.block_count())
    }

    pub fn stats(&self) -> PoolStats {
        self.list.with(|list| {
            let (free_blocks, largest_free_block) = list.scan();
            PoolStats {
                pool_size: list.pool_size(),
                free_bytes: list.free_size(),
                used_bytes: list.used_size(),
                allocated_blocks: list.block_count(),
                free_blocks,
                largest_free_block,
            }
        })
    }
}
