//! Transfer-complete handshake.
//!
//! One bit: the task raises it before handing a buffer to the link, the
//! completion interrupt clears it. The bit is an atomic, so the interrupt
//! needs no critical section.

use crate::FramebufferError;
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// The pending flag shared between the framebuffer and the completion
/// interrupt.
///
/// ```
/// use panel_fb::{SpinBudget, TransferSignal};
///
/// static TE: TransferSignal = TransferSignal::new();
///
/// TE.raise();
/// assert!(TE.is_pending());
/// TE.transmit_end(); // from the DMA-complete handler
/// assert!(TE.wait(SpinBudget::new(1)).is_ok());
/// ```
#[derive(Debug, Default)]
pub struct TransferSignal {
    pending: AtomicBool,
}

impl TransferSignal {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }

    /// Marks a transfer as outstanding.
    #[inline]
    pub fn raise(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Call from the transfer-complete interrupt.
    #[inline]
    pub fn transmit_end(&self) {
        self.pending.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Polls until the flag clears or `deadline` expires.
    ///
    /// # Errors
    /// [`FramebufferError::TransferTimeout`] when the deadline expires first.
    pub fn wait(&self, mut deadline: impl Deadline) -> Result<(), FramebufferError> {
        while self.is_pending() {
            if deadline.expired() {
                // The interrupt may have landed right after the last check.
                return if self.is_pending() {
                    Err(FramebufferError::TransferTimeout)
                } else {
                    Ok(())
                };
            }
            spin_loop();
        }
        Ok(())
    }
}

/// Bounds a busy-wait.
pub trait Deadline {
    /// Called once per poll; `true` ends the wait.
    fn expired(&mut self) -> bool;
}

/// Any `FnMut() -> bool` works as a deadline, e.g. a check against a
/// hardware timer.
impl<F: FnMut() -> bool> Deadline for F {
    fn expired(&mut self) -> bool {
        self()
    }
}

/// Gives up after a fixed number of polls.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SpinBudget {
    /// `None` never runs out.
    remaining: Option<u32>,
}

impl SpinBudget {
    #[must_use]
    pub const fn new(polls: u32) -> Self {
        Self {
            remaining: Some(polls),
        }
    }

    /// Never expires; reproduces an unbounded wait.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { remaining: None }
    }
}

impl Deadline for SpinBudget {
    fn expired(&mut self) -> bool {
        let Some(remaining) = self.remaining.as_mut() else {
            return false;
        };
        match remaining.checked_sub(1) {
            Some(left) => {
                *remaining = left;
                false
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_signal_returns_immediately() {
        let s = TransferSignal::new();
        assert!(s.wait(SpinBudget::new(0)).is_ok());
    }

    #[test]
    fn budget_expires_after_its_polls() {
        let s = TransferSignal::new();
        s.raise();
        let mut polls = 0;
        let res = s.wait(|| {
            polls += 1;
            polls > 5
        });
        assert_eq!(res, Err(FramebufferError::TransferTimeout));
        assert_eq!(polls, 6);
    }

    #[test]
    fn spin_budget_counts_down() {
        let mut b = SpinBudget::new(2);
        assert!(!b.expired());
        assert!(!b.expired());
        assert!(b.expired());
        assert!(b.expired());
    }

    #[test]
    fn largest_budget_still_runs_out() {
        let mut b = SpinBudget::new(u32::MAX);
        assert!(!b.expired());
        assert_ne!(b, SpinBudget::unbounded());
        assert_eq!(b, SpinBudget::new(u32::MAX - 1));

        let mut b = SpinBudget::new(1);
        assert!(!b.expired());
        assert!(b.expired());
    }

    #[test]
    fn unbounded_budget_never_expires() {
        let mut b = SpinBudget::unbounded();
        for _ in 0..1_000 {
            assert!(!b.expired());
        }
        assert_eq!(b, SpinBudget::unbounded());
    }

    #[test]
    fn closure_deadline_is_polled_once_per_spin() {
        let s = TransferSignal::new();
        s.raise();
        let mut polls = 0_u32;
        let res = s.wait(|| {
            polls += 1;
            if polls == 3 {
                s.transmit_end();
            }
            false
        });
        assert_eq!(res, Ok(()));
        assert_eq!(polls, 3);
    }
}
