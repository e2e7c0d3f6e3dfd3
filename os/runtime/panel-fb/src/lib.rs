//! # Display runtime framebuffer controller
//!
//! Owns one or two pixel buffers allocated from a [`BufferAlloc`], and pushes
//! them to the panel through a platform [`DisplayLink`].
//!
//! ```text
//!   task                               completion IRQ
//!   ────                               ──────────────
//!   draw_buffer_mut() ◄─ draw
//!   commit()  ─ raise ─► TransferSignal ◄─ transmit_end()
//!        └─ link.send_frame(draw)
//!   wait_transfer_end(deadline)
//!   swap_buffers()     draw ⇄ display
//! ```
//!
//! The only state shared with interrupt context is the pending flag in
//! [`TransferSignal`]. Everything else belongs to the task that owns the
//! [`Framebuffer`]; the draw/commit/swap sequence must not race with
//! itself.
//!
//! ## Transfer ordering
//!
//! The controller does not queue. A second commit while a transfer is
//! pending is allowed and races the hardware; call
//! [`Framebuffer::wait_transfer_end`] before reusing a buffer that may still
//! be on the wire. In [`TransferSync::FireAndForget`] mode the wait returns
//! immediately.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod config;
mod error;
mod framebuffer;
mod link;
mod signal;

pub use config::{Buffering, DisplayConfig, Geometry, PixelDepth, TransferSync};
pub use error::FramebufferError;
pub use framebuffer::{FRAMEBUFFER_ALIGN, Framebuffer};
pub use link::{DisplayLink, FnHooks, Region, SendFrameFn, SendRegionFn};
pub use panel_alloc::BufferAlloc;
pub use signal::{Deadline, SpinBudget, TransferSignal};
