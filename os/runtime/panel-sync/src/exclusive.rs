use crate::{ConstInit, RawLock, RawUnlock};
use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

/// A value that is only reachable inside a critical section of `R`.
///
/// The usual entry is [`with`](Self::with), which runs a closure in the
/// section. [`lock`](Self::lock) returns a [`Section`] for callers that need
/// to hold access across statements. Either way, leaving the scope (return,
/// `?`, or unwinding) ends the section.
///
/// The section is **not** reentrant. Entering the same `Exclusive` again from
/// the holder's context (including an interrupt handler that preempted the
/// holder when `R` does not mask interrupts) spins forever.
pub struct Exclusive<T, R> {
    raw: R,
    value: UnsafeCell<T>,
}

// SAFETY: `value` is only reached through a `Section`, and at most one exists
// at a time per `raw`.
unsafe impl<T: Send, R: Sync> Sync for Exclusive<T, R> {}

impl<T, R: ConstInit> Exclusive<T, R> {
    /// Usable in `static` initializers.
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            raw: R::INIT,
            value: UnsafeCell::new(value),
        }
    }
}

impl<T, R> Exclusive<T, R> {
    /// Access through `&mut self` needs no section.
    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    #[inline]
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T, R: RawUnlock> Exclusive<T, R> {
    /// Runs `f` inside the critical section and returns its result.
    #[inline]
    pub fn with<U>(&self, f: impl FnOnce(&mut T) -> U) -> U {
        let mut section = self.lock();
        f(&mut section)
    }

    /// Enters the critical section.
    #[inline]
    pub fn lock(&self) -> Section<'_, T, R> {
        let token = self.raw.raw_lock();
        // SAFETY: the section was just entered.
        unsafe { self.enter(token) }
    }

    /// Enters the critical section if it is free right now.
    #[inline]
    pub fn try_lock(&self) -> Option<Section<'_, T, R>> {
        let token = self.raw.raw_try_lock()?;
        // SAFETY: the section was just entered.
        Some(unsafe { self.enter(token) })
    }

    /// # Safety
    /// `token` must come from a successful entry into `self.raw` that no
    /// other `Section` owns.
    unsafe fn enter(&self, token: R::Token) -> Section<'_, T, R> {
        Section {
            // SAFETY: the caller holds the section, so nothing else reaches
            // the value until this `Section` drops.
            value: unsafe { &mut *self.value.get() },
            raw: &self.raw,
            token,
            _here: PhantomData,
        }
    }
}

impl<T: Default, R: ConstInit> Default for Exclusive<T, R> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Proof of being inside an [`Exclusive`]'s critical section.
///
/// Owns the lock's entry token (for [`RawIrq`](crate::RawIrq), the interrupt
/// state saved on entry) and hands it back on drop. It stays on the context
/// that entered: restoring a saved mask on another core would restore the
/// wrong core's state.
#[must_use = "the critical section ends as soon as this is dropped"]
pub struct Section<'a, T, R: RawUnlock> {
    value: &'a mut T,
    raw: &'a R,
    token: R::Token,
    _here: PhantomData<*const ()>,
}

impl<T, R: RawUnlock> Deref for Section<'_, T, R> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value
    }
}

impl<T, R: RawUnlock> DerefMut for Section<'_, T, R> {
    fn deref_mut(&mut self) -> &mut T {
        self.value
    }
}

impl<T, R: RawUnlock> Drop for Section<'_, T, R> {
    fn drop(&mut self) {
        // SAFETY: this section owns the token from the matching entry.
        unsafe { self.raw.raw_unlock(self.token) }
    }
}
