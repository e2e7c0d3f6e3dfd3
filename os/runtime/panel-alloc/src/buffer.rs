use crate::pool::MemPool;
use core::ptr::NonNull;
use panel_sync::{RawLock, RawUnlock};

/// Source of raw buffers for components that should not care which
/// allocator backs them.
///
/// The framebuffer controller takes one of these at construction; firmware
/// passes its [`MemPool`], an RTOS port can pass its kernel heap.
pub trait BufferAlloc {
    /// Allocates `size` bytes aligned to `align`, or `None`.
    fn alloc_buffer(&self, size: usize, align: usize) -> Option<NonNull<u8>>;

    /// # Safety
    /// `ptr` must come from [`alloc_buffer`](Self::alloc_buffer) on the same
    /// allocator and must not be used afterwards.
    unsafe fn free_buffer(&self, ptr: NonNull<u8>);
}

impl<R> BufferAlloc for MemPool<R>
where
    R: RawLock + RawUnlock,
{
    fn alloc_buffer(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        self.alloc_aligned(size, align)
    }

    unsafe fn free_buffer(&self, ptr: NonNull<u8>) {
        self.free(ptr.as_ptr());
    }
}

impl<A: BufferAlloc + ?Sized> BufferAlloc for &A {
    fn alloc_buffer(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        (**self).alloc_buffer(size, align)
    }

    unsafe fn free_buffer(&self, ptr: NonNull<u8>) {
        unsafe { (**self).free_buffer(ptr) }
    }
}
