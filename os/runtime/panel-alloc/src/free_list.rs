use crate::arena::Arena;
use crate::error::PoolError;
use crate::header::{BlockHeader, HEADER_SIZE, NIL, narrow};
use crate::{DEFAULT_ALIGN, MIN_ARENA_SIZE, align_up};
use core::ptr::NonNull;

/// Where inside a free block an allocation lands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Placement {
    /// The block's own payload is suitably aligned.
    InPlace,
    /// A new header is carved at `header`; the block keeps the prefix.
    Carve { header: usize },
}

/// Outcome of [`FreeList::init`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Init {
    Fresh,
    AlreadyInitialized,
}

/// A first-fit free-list allocator over a single arena.
///
/// The free list is threaded through the block headers by offset and kept in
/// **insertion order**: freed blocks are pushed at the head, and neighbours
/// are never merged. Repeated alloc/free of one size is therefore stable,
/// while mixed sizes fragment the arena over time.
///
/// # Invariants
/// - Every block on the list is free (`MAGIC_FREE`, `used == false`).
/// - Every block's header plus payload lies inside the arena.
/// - `free_size` equals the arena size minus header plus payload of every
///   allocated block.
pub(crate) struct FreeList {
    /// `None` until [`init`](Self::init) succeeds.
    arena: Option<Arena>,
    /// Offset of the first free block, or [`NIL`].
    head: u32,
    free_size: usize,
    block_count: usize,
}

// Safety: the arena pointer is only dereferenced through `&mut self`, and the
// owning `MemPool` only hands that out inside its critical section.
unsafe impl Send for FreeList {}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self {
            arena: None,
            head: NIL,
            free_size: 0,
            block_count: 0,
        }
    }

    pub(crate) const fn is_initialized(&self) -> bool {
        self.arena.is_some()
    }

    /// Takes ownership of `[start, start + size)` as one free block.
    ///
    /// First call wins: once initialized, later calls succeed without
    /// touching anything.
    ///
    /// # Safety
    /// The region must be valid for reads and writes and exclusive to this
    /// allocator for the rest of its lifetime.
    pub(crate) unsafe fn init(&mut self, start: NonNull<u8>, size: usize) -> Result<Init, PoolError> {
        if self.arena.is_some() {
            return Ok(Init::AlreadyInitialized);
        }
        if size < MIN_ARENA_SIZE {
            return Err(PoolError::InvalidArgument(
                "arena cannot hold one header and one aligned payload",
            ));
        }
        if size > u32::MAX as usize {
            return Err(PoolError::InvalidArgument(
                "arena exceeds the 32-bit header offset range",
            ));
        }

        let arena = unsafe { Arena::new(start, size) };
        arena.store(0, BlockHeader::free(narrow(size - HEADER_SIZE), NIL))?;
        self.arena = Some(arena);
        self.head = 0;
        self.free_size = size;
        self.block_count = 0;
        Ok(Init::Fresh)
    }

    pub(crate) fn pool_size(&self) -> usize {
        self.arena.map_or(0, Arena::len)
    }

    pub(crate) const fn free_size(&self) -> usize {
        self.free_size
    }

    pub(crate) fn used_size(&self) -> usize {
        self.pool_size() - self.free_size
    }

    pub(crate) const fn block_count(&self) -> usize {
        self.block_count
    }

    /// First-fit allocation of `size` bytes aligned to `align`.
    ///
    /// `size` is rounded up to [`DEFAULT_ALIGN`]; `align` is raised to at
    /// least [`DEFAULT_ALIGN`] and falls back to it when not a power of two.
    pub(crate) fn allocate(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, PoolError> {
        let arena = self.arena.ok_or(PoolError::Uninitialized)?;
        if size == 0 {
            return Err(PoolError::InvalidArgument("zero-size allocation"));
        }
        let align = effective_align(align);
        let rounded = align_up(size, DEFAULT_ALIGN)
            .filter(|s| *s <= arena.len())
            .ok_or(PoolError::OutOfMemory { requested: size })?;

        let mut prev = NIL;
        let mut cur = self.head;
        while cur != NIL {
            let offset = cur as usize;
            let block = arena.load(offset)?;
            if !block.is_free() {
                return Err(PoolError::CorruptionDetected {
                    offset,
                    magic: block.magic(),
                });
            }

            if let Some(placement) = place(arena, offset, block, rounded, align) {
                let payload = match placement {
                    Placement::InPlace => self.take_in_place(arena, prev, offset, block, rounded)?,
                    Placement::Carve { header } => {
                        Self::carve(arena, offset, block, header, rounded)?
                    }
                };
                let taken = arena.load(payload - HEADER_SIZE)?;
                self.free_size -= taken.len() + HEADER_SIZE;
                self.block_count += 1;
                return arena.ptr_at(payload);
            }

            prev = cur;
            cur = block.next();
        }

        Err(PoolError::OutOfMemory { requested: rounded })
    }

    /// Hands out the head of the block at `offset`, splitting off the tail
    /// when it can hold a header and one aligned payload unit.
    fn take_in_place(
        &mut self,
        arena: Arena,
        prev: u32,
        offset: usize,
        block: BlockHeader,
        size: usize,
    ) -> Result<usize, PoolError> {
        let payload = offset + HEADER_SIZE;
        let remainder = block.len() - size;

        let (kept, successor) = if remainder >= HEADER_SIZE + DEFAULT_ALIGN {
            let tail = payload + size;
            arena.store(
                tail,
                BlockHeader::free(narrow(remainder - HEADER_SIZE), block.next()),
            )?;
            (size, narrow(tail))
        } else {
            (block.len(), block.next())
        };

        self.relink(arena, prev, successor)?;
        arena.store(offset, BlockHeader::allocated(narrow(kept)))?;
        Ok(payload)
    }

    /// Carves an allocated block with its header at `header` out of the
    /// free block at `offset`. The free block stays listed, shrunk to the
    /// prefix; a usable tail is listed right after it.
    fn carve(
        arena: Arena,
        offset: usize,
        block: BlockHeader,
        header: usize,
        size: usize,
    ) -> Result<usize, PoolError> {
        let payload = header + HEADER_SIZE;
        let block_end = offset + HEADER_SIZE + block.len();
        let tail_len = block_end - (payload + size);

        let (kept, successor) = if tail_len >= HEADER_SIZE + DEFAULT_ALIGN {
            let tail = payload + size;
            arena.store(
                tail,
                BlockHeader::free(narrow(tail_len - HEADER_SIZE), block.next()),
            )?;
            (size, narrow(tail))
        } else {
            (size + tail_len, block.next())
        };

        let prefix = header - (offset + HEADER_SIZE);
        arena.store(
            offset,
            block.with_size(narrow(prefix)).with_next(successor),
        )?;
        arena.store(header, BlockHeader::allocated(narrow(kept)))?;
        Ok(payload)
    }

    /// Points `prev` (or the list head) at `next`.
    fn relink(&mut self, arena: Arena, prev: u32, next: u32) -> Result<(), PoolError> {
        if prev == NIL {
            self.head = next;
            return Ok(());
        }
        let p = prev as usize;
        let header = arena.load(p)?;
        arena.store(p, header.with_next(next))
    }

    /// Returns the block whose payload starts at `ptr` to the head of the
    /// free list. Returns the payload size released.
    ///
    /// Pointers outside the arena, and headers without the allocated
    /// sentinel, are rejected without modifying anything.
    pub(crate) fn release(&mut self, ptr: *const u8) -> Result<usize, PoolError> {
        let arena = self.arena.ok_or(PoolError::Uninitialized)?;
        let payload = arena
            .offset_of(ptr)
            .filter(|off| *off >= HEADER_SIZE)
            .ok_or(PoolError::ForeignPointer { addr: ptr.addr() })?;
        let offset = payload - HEADER_SIZE;

        let block = arena.load(offset)?;
        if !block.is_allocated() {
            return Err(PoolError::CorruptionDetected {
                offset,
                magic: block.magic(),
            });
        }
        let size = block.len();
        if payload + size > arena.len() {
            return Err(PoolError::CorruptionDetected {
                offset,
                magic: block.magic(),
            });
        }

        arena.store(offset, BlockHeader::free(block.size(), self.head))?;
        self.head = narrow(offset);
        self.free_size += size + HEADER_SIZE;
        self.block_count = self.block_count.saturating_sub(1);
        Ok(size)
    }

    /// Walks the free list, returning `(free blocks, largest free payload)`.
    ///
    /// The walk is bounded by the number of headers the arena could hold, so
    /// a corrupted cycle terminates.
    pub(crate) fn scan(&self) -> (usize, usize) {
        let Some(arena) = self.arena else {
            return (0, 0);
        };
        let limit = arena.len() / HEADER_SIZE;
        let mut count = 0;
        let mut largest = 0;
        let mut cur = self.head;
        while cur != NIL && count < limit {
            let Ok(block) = arena.load(cur as usize) else {
                break;
            };
            count += 1;
            largest = largest.max(block.len());
            cur = block.next();
        }
        (count, largest)
    }
}

/// Requested alignment, normalized.
const fn effective_align(align: usize) -> usize {
    if align.is_power_of_two() && align > DEFAULT_ALIGN {
        align
    } else {
        DEFAULT_ALIGN
    }
}

/// Decides whether `size` bytes aligned to `align` fit in the free block at
/// `offset`, and how.
fn place(arena: Arena, offset: usize, block: BlockHeader, size: usize, align: usize) -> Option<Placement> {
    let payload = offset + HEADER_SIZE;
    let block_end = payload + block.len();
    let payload_addr = arena.addr_of(payload);

    if payload_addr & (align - 1) == 0 {
        return (payload + size <= block_end).then_some(Placement::InPlace);
    }

    // The carved header must sit after the free block's own header.
    let carved_addr = align_up(payload_addr.checked_add(HEADER_SIZE)?, align)?;
    let carved_payload = arena.offset_of_addr(carved_addr)?;
    (carved_payload.checked_add(size)? <= block_end).then_some(Placement::Carve {
        header: carved_payload - HEADER_SIZE,
    })
}
