//! Block header codec.
//!
//! Every block in the arena, free or allocated, starts with one header:
//!
//! ```text
//! +---------------------+---------------------------+
//! | BlockHeader (16 B)  |   payload (size bytes)    |
//! +---------------------+---------------------------+
//! ^ block offset        ^ block offset + HEADER_SIZE
//! ```
//!
//! The header is a single packed `u128` so that it can be moved in and out of
//! the byte arena with one unaligned load or store.

use bitfield_struct::bitfield;

/// Size of a block header in bytes.
pub const HEADER_SIZE: usize = size_of::<u128>();

/// Sentinel stored in the header of a free block.
pub const MAGIC_FREE: u32 = 0xDEAD_BEEF;

/// Sentinel stored in the header of an allocated block.
pub const MAGIC_USED: u32 = 0xFEED_BEEF;

/// `next` value marking the end of the free list.
pub(crate) const NIL: u32 = u32::MAX;

#[bitfield(u128)]
pub(crate) struct BlockHeader {
    /// Arena offset of the next free block, or [`NIL`].
    pub next: u32,
    /// Payload bytes following the header.
    pub size: u32,
    /// [`MAGIC_FREE`] or [`MAGIC_USED`].
    pub magic: u32,
    pub used: bool,
    #[bits(31)]
    __: u32,
}

impl BlockHeader {
    pub(crate) const fn free(size: u32, next: u32) -> Self {
        Self::new()
            .with_next(next)
            .with_size(size)
            .with_magic(MAGIC_FREE)
            .with_used(false)
    }

    pub(crate) const fn allocated(size: u32) -> Self {
        Self::new()
            .with_next(NIL)
            .with_size(size)
            .with_magic(MAGIC_USED)
            .with_used(true)
    }

    pub(crate) const fn is_free(self) -> bool {
        self.magic() == MAGIC_FREE && !self.used()
    }

    pub(crate) const fn is_allocated(self) -> bool {
        self.magic() == MAGIC_USED && self.used()
    }

    /// Payload size as `usize`.
    pub(crate) const fn len(self) -> usize {
        self.size() as usize
    }
}

/// Narrows an arena offset or length for storage in a header.
///
/// Arenas are limited to `u32::MAX` bytes at initialization, so every offset
/// and length inside one fits.
#[allow(clippy::cast_possible_truncation)]
#[inline]
pub(crate) const fn narrow(v: usize) -> u32 {
    debug_assert!(v <= u32::MAX as usize);
    v as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_sixteen_bytes() {
        assert_eq!(HEADER_SIZE, 16);
        assert_eq!(size_of::<BlockHeader>(), HEADER_SIZE);
    }

    #[test]
    fn free_and_allocated_are_distinct() {
        let f = BlockHeader::free(48, NIL);
        assert!(f.is_free());
        assert!(!f.is_allocated());
        assert_eq!(f.len(), 48);
        assert_eq!(f.next(), NIL);

        let a = BlockHeader::allocated(16);
        assert!(a.is_allocated());
        assert!(!a.is_free());
        assert_eq!(a.magic(), MAGIC_USED);
    }

    #[test]
    fn survives_bit_round_trip() {
        let h = BlockHeader::free(0x1234, 0x40);
        let back = BlockHeader::from_bits(h.into_bits());
        assert_eq!(back.size(), 0x1234);
        assert_eq!(back.next(), 0x40);
        assert_eq!(back.magic(), MAGIC_FREE);
    }
}
