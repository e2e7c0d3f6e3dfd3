use crate::config::{Buffering, DisplayConfig, Geometry, TransferSync};
use crate::link::{DisplayLink, FnHooks, Region};
use crate::signal::{Deadline, TransferSignal};
use crate::FramebufferError;
use core::ptr::NonNull;
use core::slice;
use log::{debug, info, trace, warn};
use panel_alloc::BufferAlloc;

/// Alignment of every pixel buffer; suits DMA engines that burst 32 bytes.
pub const FRAMEBUFFER_ALIGN: usize = 32;

/// One or two pixel buffers plus the link that transmits them.
///
/// The buffers come from a [`BufferAlloc`] and are given back by
/// [`release`](Self::release). Dropping a `Framebuffer` without releasing it
/// leaks the buffers, which is the usual case in firmware where the display
/// lives until reset.
///
/// # Frame loop
///
/// ```
/// use panel_alloc::{MemPool, StaticArena};
/// use panel_fb::{Buffering, DisplayConfig, FnHooks, Framebuffer, SpinBudget};
/// use panel_sync::RawSpin;
///
/// static ARENA: StaticArena<{ 64 * 1024 }> = StaticArena::new();
/// static POOL: MemPool<RawSpin> = MemPool::new();
/// POOL.init_static(ARENA.take().unwrap()).unwrap();
///
/// let config = DisplayConfig::DEFAULT
///     .with_size(64, 48)
///     .with_buffering(Buffering::Double);
/// let mut fb: Framebuffer = Framebuffer::init(&config, &POOL, None).unwrap();
/// fb.set_link(FnHooks::new(|_frame| {}, |_region, _pixels| {}));
///
/// fb.draw_buffer_mut().fill(0xFF);
/// fb.commit();
/// fb.wait_transfer_end(SpinBudget::new(1_000)).unwrap();
/// fb.swap_buffers();
/// ```
pub struct Framebuffer<'s, L = FnHooks> {
    primary: NonNull<u8>,
    secondary: Option<NonNull<u8>>,
    draw: NonNull<u8>,
    display: NonNull<u8>,
    geometry: Geometry,
    signal: Option<&'s TransferSignal>,
    link: Option<L>,
}

// Safety: the buffers are owned exclusively by this value.
unsafe impl<L: Send> Send for Framebuffer<'_, L> {}

impl<'s, L: DisplayLink> Framebuffer<'s, L> {
    /// Allocates the pixel buffer(s) for `config` from `alloc`.
    ///
    /// In double-buffered mode the first buffer draws and the second
    /// displays. `signal` is required with [`TransferSync::CompletionSignal`]
    /// and ignored otherwise.
    ///
    /// # Errors
    /// - [`FramebufferError::InvalidGeometry`] for a zero-sized display.
    /// - [`FramebufferError::MissingSignal`] when completion-signal mode has
    ///   no signal.
    /// - [`FramebufferError::OutOfMemory`] when a buffer cannot be
    ///   allocated. A failed second buffer releases the first.
    pub fn init<A>(
        config: &DisplayConfig,
        alloc: &A,
        signal: Option<&'s TransferSignal>,
    ) -> Result<Self, FramebufferError>
    where
        A: BufferAlloc + ?Sized,
    {
        let frame_bytes = config.frame_bytes()?;
        let signal = match config.sync {
            TransferSync::FireAndForget => None,
            TransferSync::CompletionSignal => Some(signal.ok_or(FramebufferError::MissingSignal)?),
        };

        let primary = alloc
            .alloc_buffer(frame_bytes, FRAMEBUFFER_ALIGN)
            .ok_or(FramebufferError::OutOfMemory {
                index: 0,
                bytes: frame_bytes,
            })?;

        let secondary = match config.buffering {
            Buffering::Single => None,
            Buffering::Double => {
                let Some(second) = alloc.alloc_buffer(frame_bytes, FRAMEBUFFER_ALIGN) else {
                    // SAFETY: allocated above and not yet shared.
                    unsafe { alloc.free_buffer(primary) };
                    debug!("framebuffer: second buffer failed, released first");
                    return Err(FramebufferError::OutOfMemory {
                        index: 1,
                        bytes: frame_bytes,
                    });
                };
                Some(second)
            }
        };

        info!(
            "framebuffer: {}x{}@{}bpp, {} x {frame_bytes} bytes",
            config.width,
            config.height,
            config.depth.bits(),
            if secondary.is_some() { 2 } else { 1 }
        );

        Ok(Self {
            primary,
            secondary,
            draw: primary,
            display: secondary.unwrap_or(primary),
            geometry: Geometry {
                width: config.width,
                height: config.height,
                depth: config.depth,
                stride: config.stride(),
                frame_bytes,
            },
            signal,
            link: None,
        })
    }

    /// Installs the link, returning the previous one.
    pub fn set_link(&mut self, link: L) -> Option<L> {
        self.link.replace(link)
    }

    /// Removes the link; later sends are skipped.
    pub fn take_link(&mut self) -> Option<L> {
        self.link.take()
    }

    pub fn link_mut(&mut self) -> Option<&mut L> {
        self.link.as_mut()
    }

    /// Sends the whole draw buffer.
    pub fn commit(&mut self) {
        self.raise();
        let frame = self.draw_slice();
        if let Some(link) = self.link.as_mut() {
            link.send_frame(frame);
        }
        trace!("framebuffer: commit {} bytes", frame.len());
    }

    /// Sends a rectangle of the draw buffer, one scanline per link call.
    ///
    /// The rectangle is clamped to the framebuffer. An origin outside the
    /// framebuffer fails without calling the link; a rectangle that clamps
    /// to nothing succeeds without calling it.
    ///
    /// Every row raises the same pending flag, so the completion handshake
    /// covers only one transfer at a time. If the link queues rows and
    /// completes them asynchronously, the first completion clears the flag
    /// and [`wait_transfer_end`](Self::wait_transfer_end) returns while later
    /// rows may still be in flight. Such links should report completion only
    /// once their queue drains.
    ///
    /// # Errors
    /// [`FramebufferError::GeometryOutOfBounds`] if `x >= width` or
    /// `y >= height`.
    pub fn commit_region(&mut self, x: u16, y: u16, w: u16, h: u16) -> Result<(), FramebufferError> {
        let Geometry {
            width,
            height,
            depth,
            stride,
            ..
        } = self.geometry;
        if x >= width || y >= height {
            warn!("framebuffer: region origin ({x}, {y}) outside {width}x{height}");
            return Err(FramebufferError::GeometryOutOfBounds { x, y });
        }

        let w = w.min(width - x);
        let h = h.min(height - y);
        if w == 0 || h == 0 {
            return Ok(());
        }

        let bpp = depth.bytes();
        let row_bytes = usize::from(w) * bpp;
        let frame = self.draw_slice();
        for row in 0..h {
            let start = usize::from(y + row) * stride + usize::from(x) * bpp;
            let pixels = &frame[start..start + row_bytes];
            self.raise();
            if let Some(link) = self.link.as_mut() {
                link.send_region(Region::new(x, y + row, w, 1), pixels);
            }
        }
        trace!("framebuffer: commit region ({x}, {y}) {w}x{h}");
        Ok(())
    }
}

impl<L> Framebuffer<'_, L> {
    /// Exchanges draw and display buffers; does nothing when single-buffered.
    ///
    /// Wait for the previous transfer first: the buffer being displayed
    /// becomes the draw target.
    pub fn swap_buffers(&mut self) {
        if self.secondary.is_some() {
            core::mem::swap(&mut self.draw, &mut self.display);
            debug!("framebuffer: swap, drawing into {:#x}", self.draw.as_ptr().addr());
        }
    }

    /// Clears the pending flag. Safe to call from the completion interrupt.
    #[inline]
    pub fn transmit_end(&self) {
        if let Some(signal) = self.signal {
            signal.transmit_end();
        }
    }

    /// Polls until the last transfer completes or `deadline` expires.
    /// Returns immediately in fire-and-forget mode.
    ///
    /// # Errors
    /// [`FramebufferError::TransferTimeout`] when the deadline expires first.
    pub fn wait_transfer_end(&self, deadline: impl Deadline) -> Result<(), FramebufferError> {
        self.signal.map_or(Ok(()), |signal| signal.wait(deadline))
    }

    pub fn is_transfer_pending(&self) -> bool {
        self.signal.is_some_and(TransferSignal::is_pending)
    }

    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub const fn is_double_buffered(&self) -> bool {
        self.secondary.is_some()
    }

    pub const fn draw_ptr(&self) -> NonNull<u8> {
        self.draw
    }

    pub const fn display_ptr(&self) -> NonNull<u8> {
        self.display
    }

    /// The buffer to draw the next frame into.
    pub fn draw_buffer_mut(&mut self) -> &mut [u8] {
        // SAFETY: the buffer is `frame_bytes` long and owned by `self`.
        unsafe { slice::from_raw_parts_mut(self.draw.as_ptr(), self.geometry.frame_bytes) }
    }

    /// The buffer last handed to the display.
    pub const fn display_buffer(&self) -> &[u8] {
        // SAFETY: as above.
        unsafe { slice::from_raw_parts(self.display.as_ptr(), self.geometry.frame_bytes) }
    }

    /// Returns the buffers to `alloc`, which must be the allocator passed to
    /// [`init`](Framebuffer::init).
    pub fn release<A>(self, alloc: &A)
    where
        A: BufferAlloc + ?Sized,
    {
        // SAFETY: both came from `alloc` in `init` and die with `self`.
        unsafe {
            alloc.free_buffer(self.primary);
            if let Some(secondary) = self.secondary {
                alloc.free_buffer(secondary);
            }
        }
        debug!("framebuffer: released");
    }

    fn raise(&self) {
        if let Some(signal) = self.signal {
            signal.raise();
        }
    }

    /// The draw buffer, detached from `self` so the link can be borrowed
    /// alongside it.
    const fn draw_slice<'b>(&self) -> &'b [u8] {
        // SAFETY: the buffer outlives any borrow of `self` and is not written
        // while a commit runs.
        unsafe { slice::from_raw_parts(self.draw.as_ptr(), self.geometry.frame_bytes) }
    }
}
