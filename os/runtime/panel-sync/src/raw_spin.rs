use crate::{ConstInit, RawLock, RawUnlock};
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// Spin flag for hosted and multi-core targets.
///
/// Does not touch the interrupt state. Sharing a `RawSpin`-protected value
/// with an interrupt handler on the same core deadlocks if the handler fires
/// while the task holds the flag; use [`RawIrq`](crate::RawIrq) there, which
/// wraps one of these behind an interrupt mask.
#[derive(Debug, Default)]
pub struct RawSpin {
    held: AtomicBool,
}

impl RawSpin {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// One acquisition attempt.
    #[inline]
    #[must_use]
    pub fn acquire(&self) -> bool {
        self.held
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Spins until the flag is ours. Waiters only read the flag until it
    /// looks free, so a contended line is not hammered with writes.
    #[inline]
    pub fn acquire_spinning(&self) {
        while !self.acquire() {
            while self.held.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    /// # Safety
    /// The caller must hold the flag.
    #[inline]
    pub unsafe fn release(&self) {
        self.held.store(false, Ordering::Release);
    }
}

impl ConstInit for RawSpin {
    const INIT: Self = Self::new();
}

impl RawLock for RawSpin {
    type Token = ();

    fn raw_lock(&self) {
        self.acquire_spinning();
    }

    fn raw_try_lock(&self) -> Option<()> {
        // `compare_exchange_weak` may fail spuriously; a single try should
        // only fail when the flag is actually held.
        loop {
            if self.acquire() {
                return Some(());
            }
            if self.held.load(Ordering::Relaxed) {
                return None;
            }
        }
    }
}

impl RawUnlock for RawSpin {
    unsafe fn raw_unlock(&self, (): ()) {
        unsafe { self.release() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_lock_reports_holder() {
        let spin = RawSpin::new();
        assert_eq!(spin.raw_try_lock(), Some(()));
        assert_eq!(spin.raw_try_lock(), None);
        unsafe { spin.raw_unlock(()) };
        spin.raw_lock();
        assert!(!spin.acquire());
    }
}
