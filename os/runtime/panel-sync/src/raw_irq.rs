use crate::mask::InterruptMask;
use crate::{ConstInit, RawLock, RawSpin, RawUnlock};
use core::marker::PhantomData;

/// Interrupt-masking critical section.
///
/// Locking masks interrupts through `M` first and then takes a [`RawSpin`],
/// so the section excludes both interrupt handlers on the current core and
/// other cores. The interrupt state saved on entry is the lock's token; the
/// guard carries it and unlocking restores exactly that state.
///
/// Entering the same `RawIrq` twice on one core (e.g. from a handler that
/// somehow runs with interrupts masked) spins forever; the section is not
/// reentrant.
pub struct RawIrq<M: InterruptMask> {
    spin: RawSpin,
    _mask: PhantomData<fn() -> M>,
}

impl<M: InterruptMask> Default for RawIrq<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: InterruptMask> RawIrq<M> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            spin: RawSpin::new(),
            _mask: PhantomData,
        }
    }
}

impl<M: InterruptMask> ConstInit for RawIrq<M> {
    const INIT: Self = Self::new();
}

impl<M: InterruptMask> RawLock for RawIrq<M> {
    type Token = M::State;

    fn raw_lock(&self) -> M::State {
        let saved = M::save_and_disable();
        self.spin.raw_lock();
        saved
    }

    fn raw_try_lock(&self) -> Option<M::State> {
        let saved = M::save_and_disable();
        if self.spin.raw_try_lock().is_some() {
            Some(saved)
        } else {
            // SAFETY: `saved` came from the call above and nothing was
            // entered after it.
            unsafe { M::restore(saved) };
            None
        }
    }
}

impl<M: InterruptMask> RawUnlock for RawIrq<M> {
    unsafe fn raw_unlock(&self, saved: M::State) {
        // Release the flag while still masked, then put interrupts back.
        unsafe {
            self.spin.raw_unlock(());
            M::restore(saved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoMask;

    #[test]
    fn second_entry_fails_until_released() {
        let irq = RawIrq::<NoMask>::new();
        irq.raw_lock();
        assert!(irq.raw_try_lock().is_none());
        unsafe { irq.raw_unlock(()) };
        assert!(irq.raw_try_lock().is_some());
        unsafe { irq.raw_unlock(()) };
    }
}
