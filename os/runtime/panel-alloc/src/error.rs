/// Failures reported by the pool allocator.
///
/// Allocation failure is an ordinary outcome: the `Option`-returning calls
/// on [`MemPool`](crate::MemPool) map every variant to `None`, and only the
/// `try_*` calls expose the reason.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("pool is not initialized")]
    Uninitialized,
    #[error("out of memory: no free block holds {requested} bytes")]
    OutOfMemory { requested: usize },
    #[error("block header at offset {offset:#x} failed validation (magic {magic:#010x})")]
    CorruptionDetected { offset: usize, magic: u32 },
    #[error("pointer {addr:#x} does not belong to this pool")]
    ForeignPointer { addr: usize },
}

impl PoolError {
    pub(crate) const fn corrupt_at(offset: usize) -> Self {
        Self::CorruptionDetected { offset, magic: 0 }
    }
}
