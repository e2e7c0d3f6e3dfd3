//! Platform hooks that push pixels to the panel.

/// A rectangle in pixel coordinates.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Region {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl Region {
    #[must_use]
    pub const fn new(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }
}

/// Transport from the framebuffer to the physical display (SPI, parallel
/// bus, DMA2D, ...).
///
/// Implementations typically start a DMA transfer and return; the transfer's
/// completion interrupt then calls
/// [`TransferSignal::transmit_end`](crate::TransferSignal::transmit_end).
pub trait DisplayLink {
    /// Sends a whole frame.
    fn send_frame(&mut self, frame: &[u8]);

    /// Sends the pixels of `region`, tightly packed.
    fn send_region(&mut self, region: Region, pixels: &[u8]);
}

impl<L: DisplayLink + ?Sized> DisplayLink for &mut L {
    fn send_frame(&mut self, frame: &[u8]) {
        (**self).send_frame(frame);
    }

    fn send_region(&mut self, region: Region, pixels: &[u8]) {
        (**self).send_region(region, pixels);
    }
}

pub type SendFrameFn = fn(&[u8]);
pub type SendRegionFn = fn(Region, &[u8]);

/// Plain function-pointer hooks. Unset hooks are skipped.
#[derive(Debug, Default, Copy, Clone)]
pub struct FnHooks {
    pub send_frame: Option<SendFrameFn>,
    pub send_region: Option<SendRegionFn>,
}

impl FnHooks {
    #[must_use]
    pub const fn new(send_frame: SendFrameFn, send_region: SendRegionFn) -> Self {
        Self {
            send_frame: Some(send_frame),
            send_region: Some(send_region),
        }
    }
}

impl DisplayLink for FnHooks {
    fn send_frame(&mut self, frame: &[u8]) {
        if let Some(f) = self.send_frame {
            f(frame);
        }
    }

    fn send_region(&mut self, region: Region, pixels: &[u8]) {
        if let Some(f) = self.send_region {
            f(region, pixels);
        }
    }
}
