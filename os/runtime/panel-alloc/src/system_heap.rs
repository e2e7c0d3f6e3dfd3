//! [`BufferAlloc`] over the platform's global allocator.
//!
//! For ports that run on an RTOS whose heap is already installed as the
//! `#[global_allocator]`. Each block carries a prefix recording its layout,
//! so freeing needs only the pointer.

extern crate alloc;

use crate::DEFAULT_ALIGN;
use crate::buffer::BufferAlloc;
use alloc::alloc::{Layout, alloc, dealloc};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};
use log::{debug, trace};

const PREFIX_WORDS: usize = 2;
const PREFIX_SIZE: usize = PREFIX_WORDS * size_of::<usize>();

#[derive(Debug, Default)]
pub struct SystemHeap {
    outstanding: AtomicUsize,
}

impl SystemHeap {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Payload bytes handed out and not yet freed.
    pub fn outstanding_bytes(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }

    /// The prefix occupies a whole alignment unit so the payload stays aligned.
    fn layout_for(size: usize, align: usize) -> Option<(Layout, usize)> {
        let align = if align.is_power_of_two() {
            align.max(DEFAULT_ALIGN)
        } else {
            DEFAULT_ALIGN
        };
        let offset = align.max(PREFIX_SIZE);
        let total = size.checked_add(offset)?;
        let layout = Layout::from_size_align(total, align).ok()?;
        Some((layout, offset))
    }
}

impl BufferAlloc for SystemHeap {
    fn alloc_buffer(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }
        let (layout, offset) = Self::layout_for(size, align)?;
        // SAFETY: layout has a non-zero size.
        let Some(base) = NonNull::new(unsafe { alloc(layout) }) else {
            debug!("system heap: alloc {size}@{align} failed");
            return None;
        };

        // SAFETY: `offset >= PREFIX_SIZE` and the block is `size + offset` long;
        // the prefix sits right below the payload and is usize-aligned.
        let payload = unsafe {
            let payload = base.add(offset);
            let prefix = payload.cast::<usize>().sub(PREFIX_WORDS);
            prefix.write(layout.size());
            prefix.add(1).write(layout.align());
            payload
        };
        self.outstanding.fetch_add(size, Ordering::Relaxed);
        trace!("system heap: alloc {size}@{align} -> {:#x}", payload.as_ptr().addr());
        Some(payload)
    }

    unsafe fn free_buffer(&self, ptr: NonNull<u8>) {
        // SAFETY: `ptr` came from `alloc_buffer`, which wrote the prefix.
        unsafe {
            let prefix = ptr.cast::<usize>().sub(PREFIX_WORDS);
            let total = prefix.read();
            let align = prefix.add(1).read();
            let offset = align.max(PREFIX_SIZE);
            let layout = Layout::from_size_align_unchecked(total, align);
            dealloc(ptr.as_ptr().sub(offset), layout);
            self.outstanding.fetch_sub(total - offset, Ordering::Relaxed);
        }
        trace!("system heap: free {:#x}", ptr.as_ptr().addr());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn honours_alignment_and_tracks_bytes() {
        let heap = SystemHeap::new();
        let a = heap.alloc_buffer(100, 64).unwrap();
        let b = heap.alloc_buffer(10, 3).unwrap();
        assert_eq!(a.as_ptr().addr() % 64, 0);
        assert_eq!(b.as_ptr().addr() % DEFAULT_ALIGN, 0);
        assert_eq!(heap.outstanding_bytes(), 110);

        unsafe {
            a.as_ptr().write_bytes(0x5A, 100);
            heap.free_buffer(a);
            heap.free_buffer(b);
        }
        assert_eq!(heap.outstanding_bytes(), 0);
    }

    #[test]
    fn zero_size_is_refused() {
        assert!(SystemHeap::new().alloc_buffer(0, 16).is_none());
    }
}
