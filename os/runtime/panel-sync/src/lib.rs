//! # Display runtime synchronization primitives
//!
//! Everything the allocator and the framebuffer controller mutate is shared
//! between task code and interrupt handlers on a single address space. This
//! crate provides the one capability both need: **exclusive access** for the
//! duration of a call, released on every exit path.
//!
//! The capability is expressed as a pair of raw lock traits ([`RawLock`],
//! [`RawUnlock`]) and a value wrapper ([`Exclusive`]) that hands out RAII
//! guards. Which raw lock backs a given [`Exclusive`] is a platform decision:
//!
//! | Flavour | Use on |
//! |---|---|
//! | [`RawIrq`] | bare-metal parts; masks interrupts, then takes a spin flag |
//! | [`RawSpin`] | hosted or multi-core targets without interrupt access |
//! | your own | e.g. an RTOS critical section implementing [`RawLock`] |
//!
//! Interrupt masking is abstracted by [`InterruptMask`]; [`NativeMask`]
//! selects the implementation for the current bare-metal target and falls
//! back to [`NoMask`] on hosted targets.
//!
//! ```
//! use panel_sync::{Exclusive, RawSpin};
//!
//! static COUNTER: Exclusive<u32, RawSpin> = Exclusive::new(0);
//!
//! COUNTER.with(|c| *c += 1);
//! assert_eq!(*COUNTER.lock(), 1);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod exclusive;
pub mod mask;
mod raw_irq;
mod raw_spin;

pub use exclusive::{Exclusive, Section};
pub use mask::{InterruptMask, MaskGuard, NativeMask, NoMask};
pub use raw_irq::RawIrq;
pub use raw_spin::RawSpin;

/// Critical section backed by interrupt masking on the current target.
pub type IrqExclusive<T> = Exclusive<T, RawIrq<NativeMask>>;

/// Critical section backed by a plain spin flag.
pub type SpinExclusive<T> = Exclusive<T, RawSpin>;

/// Entering a critical section.
///
/// Entry hands back a [`Token`](Self::Token) holding whatever the exit needs,
/// such as the interrupt state saved on entry. The token travels with the
/// guard, so a lock never has to stash per-holder state in itself.
pub trait RawLock {
    type Token: Copy;

    fn raw_lock(&self) -> Self::Token;
    fn raw_try_lock(&self) -> Option<Self::Token>;
}

/// Leaving a critical section.
pub trait RawUnlock: RawLock {
    /// # Safety
    /// Only the current holder may release the lock, passing the token its
    /// entry returned.
    unsafe fn raw_unlock(&self, token: Self::Token);
}

/// Lock flavours that can be built in `const` context, so that the values
/// they protect can live in `static`s.
pub trait ConstInit {
    const INIT: Self;
}
