//! Interrupt masking.
//!
//! [`InterruptMask`] is the platform seam: save the current interrupt-enable
//! state, disable interrupts, and later restore exactly the saved state.
//! Restoring (rather than unconditionally enabling) keeps nested critical
//! sections correct: the inner one must not re-enable interrupts the outer
//! one disabled.
//!
//! # Safety & Privilege
//!
//! The architecture implementations execute privileged instructions. They
//! must only run where those are legal: Cortex-M privileged thread/handler
//! mode, RISC-V machine mode, x86 ring 0. On hosted targets use [`NoMask`],
//! which [`NativeMask`] selects automatically.

use core::marker::PhantomData;
use core::sync::atomic::{Ordering, compiler_fence};

pub trait InterruptMask {
    /// Whatever is needed to put the interrupt state back.
    type State: Copy;

    /// Disables interrupts and returns the state they were in before.
    fn save_and_disable() -> Self::State;

    /// Puts the interrupt state back to `state`.
    ///
    /// # Safety
    /// `state` must come from the matching [`save_and_disable`](Self::save_and_disable)
    /// call, and critical sections must be exited in reverse order of entry.
    unsafe fn restore(state: Self::State);
}

/// No interrupts to mask: hosted targets, tests, and code that only ever runs
/// in task context.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoMask;

impl InterruptMask for NoMask {
    type State = ();

    #[inline]
    fn save_and_disable() {}

    #[inline]
    unsafe fn restore((): ()) {}
}

/// ARM Cortex-M `PRIMASK`.
#[cfg(target_arch = "arm")]
#[derive(Debug, Default, Copy, Clone)]
pub struct Primask;

#[cfg(target_arch = "arm")]
impl InterruptMask for Primask {
    type State = u32;

    #[inline]
    fn save_and_disable() -> u32 {
        let primask: u32;
        unsafe {
            core::arch::asm!("mrs {}, PRIMASK", out(reg) primask, options(nomem, nostack, preserves_flags));
            core::arch::asm!("cpsid i", options(nomem, nostack, preserves_flags));
        }
        compiler_fence(Ordering::SeqCst);
        primask
    }

    #[inline]
    unsafe fn restore(state: u32) {
        compiler_fence(Ordering::SeqCst);
        // PRIMASK bit 0 set means interrupts were already masked.
        if state & 1 == 0 {
            unsafe { core::arch::asm!("cpsie i", options(nomem, nostack, preserves_flags)) }
        }
    }
}

/// RISC-V machine-mode interrupt enable (`mstatus.MIE`).
#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
#[derive(Debug, Default, Copy, Clone)]
pub struct Mstatus;

#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
impl InterruptMask for Mstatus {
    type State = bool;

    #[inline]
    fn save_and_disable() -> bool {
        let mstatus: usize;
        unsafe {
            core::arch::asm!("csrrci {}, mstatus, 8", out(reg) mstatus, options(nomem, nostack));
        }
        compiler_fence(Ordering::SeqCst);
        mstatus & 0x8 != 0
    }

    #[inline]
    unsafe fn restore(were_enabled: bool) {
        compiler_fence(Ordering::SeqCst);
        if were_enabled {
            unsafe { core::arch::asm!("csrsi mstatus, 8", options(nomem, nostack)) }
        }
    }
}

/// x86/x86_64 `RFLAGS.IF`.
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Default, Copy, Clone)]
pub struct Rflags;

#[cfg(target_arch = "x86_64")]
impl Rflags {
    /// Returns the current `RFLAGS` value (via `pushfq/pop`).
    #[inline]
    #[must_use]
    pub fn read() -> u64 {
        let r: u64;
        unsafe { core::arch::asm!("pushfq; pop {}", out(reg) r, options(nostack, preserves_flags)) }
        r
    }
}

#[cfg(target_arch = "x86_64")]
impl InterruptMask for Rflags {
    type State = bool;

    #[inline]
    fn save_and_disable() -> bool {
        let enabled = (Self::read() & (1 << 9)) != 0;
        if enabled {
            unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
        }
        compiler_fence(Ordering::SeqCst);
        enabled
    }

    #[inline]
    unsafe fn restore(were_enabled: bool) {
        compiler_fence(Ordering::SeqCst);
        if were_enabled {
            unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
        }
    }
}

#[cfg(all(target_os = "none", target_arch = "arm"))]
pub type NativeMask = Primask;

#[cfg(all(
    target_os = "none",
    any(target_arch = "riscv32", target_arch = "riscv64")
))]
pub type NativeMask = Mstatus;

#[cfg(all(target_os = "none", target_arch = "x86_64"))]
pub type NativeMask = Rflags;

#[cfg(not(all(
    target_os = "none",
    any(
        target_arch = "arm",
        target_arch = "riscv32",
        target_arch = "riscv64",
        target_arch = "x86_64"
    )
)))]
pub type NativeMask = NoMask;

/// RAII guard that masks interrupts on creation and restores the saved state
/// on drop.
///
/// ```
/// use panel_sync::{MaskGuard, NoMask};
///
/// {
///     let _g = MaskGuard::<NoMask>::new();
///     // interrupts masked here
/// }
/// // previous state restored
/// ```
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct MaskGuard<M: InterruptMask> {
    saved: M::State,
    // Restoring on another core would restore the wrong core's state.
    _not_send: PhantomData<*mut M>,
}

impl<M: InterruptMask> Default for MaskGuard<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: InterruptMask> MaskGuard<M> {
    #[inline]
    pub fn new() -> Self {
        Self {
            saved: M::save_and_disable(),
            _not_send: PhantomData,
        }
    }
}

impl<M: InterruptMask> Drop for MaskGuard<M> {
    fn drop(&mut self) {
        // SAFETY: `saved` came from `save_and_disable` in `new`, and guards
        // are dropped in reverse order of creation.
        unsafe { M::restore(self.saved) }
    }
}
