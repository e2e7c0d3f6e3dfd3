use crate::error::PoolError;
use crate::header::{BlockHeader, HEADER_SIZE};
use core::ptr::{self, NonNull};

/// The backing byte region of a pool, addressed by offset.
///
/// Headers are only ever read or written through [`load`](Self::load) and
/// [`store`](Self::store), which refuse offsets whose header would not fit
/// inside the region.
#[derive(Copy, Clone)]
pub(crate) struct Arena {
    base: NonNull<u8>,
    len: usize,
}

impl Arena {
    /// # Safety
    /// `[base, base + len)` must be valid for reads and writes, and exclusively
    /// owned by the allocator, for as long as the arena is used.
    pub(crate) const unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        Self { base, len }
    }

    pub(crate) const fn len(self) -> usize {
        self.len
    }

    /// Absolute address of `offset`.
    pub(crate) fn addr_of(self, offset: usize) -> usize {
        self.base.as_ptr().addr() + offset
    }

    /// Offset of `ptr` inside the arena, if it points into it.
    pub(crate) fn offset_of(self, ptr: *const u8) -> Option<usize> {
        ptr.addr()
            .checked_sub(self.base.as_ptr().addr())
            .filter(|off| *off <= self.len)
    }

    /// Offset of the absolute address `addr`, if it lies inside the arena.
    pub(crate) fn offset_of_addr(self, addr: usize) -> Option<usize> {
        addr.checked_sub(self.base.as_ptr().addr())
            .filter(|off| *off <= self.len)
    }

    pub(crate) fn ptr_at(self, offset: usize) -> Result<NonNull<u8>, PoolError> {
        if offset > self.len {
            return Err(PoolError::corrupt_at(offset));
        }
        // SAFETY: offset is within the region handed to `new`.
        Ok(unsafe { self.base.add(offset) })
    }

    fn header_fits(self, offset: usize) -> bool {
        offset
            .checked_add(HEADER_SIZE)
            .is_some_and(|end| end <= self.len)
    }

    pub(crate) fn load(self, offset: usize) -> Result<BlockHeader, PoolError> {
        if !self.header_fits(offset) {
            return Err(PoolError::corrupt_at(offset));
        }
        // SAFETY: bounds checked above; headers are stored unaligned.
        let bits = unsafe {
            ptr::read_unaligned(self.base.as_ptr().add(offset).cast::<u128>())
        };
        Ok(BlockHeader::from_bits(bits))
    }

    pub(crate) fn store(self, offset: usize, header: BlockHeader) -> Result<(), PoolError> {
        if !self.header_fits(offset) {
            return Err(PoolError::corrupt_at(offset));
        }
        // SAFETY: bounds checked above; headers are stored unaligned.
        unsafe {
            ptr::write_unaligned(
                self.base.as_ptr().add(offset).cast::<u128>(),
                header.into_bits(),
            );
        }
        Ok(())
    }
}
