//! Display configuration.
//!
//! Board constants are expressed as a `const` [`DisplayConfig`] so firmware
//! can keep them next to the pin map:
//!
//! ```
//! use panel_fb::{Buffering, DisplayConfig, PixelDepth, TransferSync};
//!
//! const PANEL: DisplayConfig = DisplayConfig::DEFAULT
//!     .with_size(480, 272)
//!     .with_depth(PixelDepth::Rgb565)
//!     .with_buffering(Buffering::Double)
//!     .with_sync(TransferSync::CompletionSignal);
//!
//! assert_eq!(PANEL.frame_bytes(), Ok(480 * 272 * 2));
//! ```

use crate::FramebufferError;
use panel_alloc::{DEFAULT_ALIGN, align_up};

/// In-memory pixel width.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum PixelDepth {
    Rgb565 = 16,
    Rgb888 = 24,
    #[default]
    Argb8888 = 32,
}

impl PixelDepth {
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn bytes(self) -> usize {
        self as usize / 8
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum Buffering {
    #[default]
    Single,
    /// Draw into one buffer while the other is transmitted.
    Double,
}

/// Whether the platform reports transfer completion.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum TransferSync {
    /// Sends are assumed done when the hook returns.
    #[default]
    FireAndForget,
    /// A completion interrupt calls
    /// [`TransferSignal::transmit_end`](crate::TransferSignal::transmit_end).
    CompletionSignal,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    pub width: u16,
    pub height: u16,
    pub depth: PixelDepth,
    pub buffering: Buffering,
    pub sync: TransferSync,
}

impl DisplayConfig {
    /// 320×240 at 32 bpp, single-buffered, fire-and-forget.
    pub const DEFAULT: Self = Self {
        width: 320,
        height: 240,
        depth: PixelDepth::Argb8888,
        buffering: Buffering::Single,
        sync: TransferSync::FireAndForget,
    };

    #[must_use]
    pub const fn with_size(mut self, width: u16, height: u16) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    #[must_use]
    pub const fn with_depth(mut self, depth: PixelDepth) -> Self {
        self.depth = depth;
        self
    }

    #[must_use]
    pub const fn with_buffering(mut self, buffering: Buffering) -> Self {
        self.buffering = buffering;
        self
    }

    #[must_use]
    pub const fn with_sync(mut self, sync: TransferSync) -> Self {
        self.sync = sync;
        self
    }

    /// Bytes per scanline.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.width as usize * self.depth.bytes()
    }

    /// Bytes per buffer, rounded up to the allocator's alignment.
    ///
    /// # Errors
    /// [`FramebufferError::InvalidGeometry`] for a zero width or height.
    pub const fn frame_bytes(&self) -> Result<usize, FramebufferError> {
        if self.width == 0 || self.height == 0 {
            return Err(FramebufferError::InvalidGeometry);
        }
        let Some(raw) = self.stride().checked_mul(self.height as usize) else {
            return Err(FramebufferError::InvalidGeometry);
        };
        match align_up(raw, DEFAULT_ALIGN) {
            Some(bytes) => Ok(bytes),
            None => Err(FramebufferError::InvalidGeometry),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Geometry of an initialized framebuffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub width: u16,
    pub height: u16,
    pub depth: PixelDepth,
    /// Bytes per scanline.
    pub stride: usize,
    /// Bytes per buffer, including alignment padding.
    pub frame_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_reference_panel() {
        let c = DisplayConfig::default();
        assert_eq!((c.width, c.height), (320, 240));
        assert_eq!(c.depth.bits(), 32);
        assert_eq!(c.buffering, Buffering::Single);
        assert_eq!(c.sync, TransferSync::FireAndForget);
        assert_eq!(c.frame_bytes(), Ok(320 * 240 * 4));
    }

    #[test]
    fn frame_bytes_round_up_to_alignment() {
        let c = DisplayConfig::DEFAULT
            .with_size(3, 3)
            .with_depth(PixelDepth::Rgb888);
        assert_eq!(c.stride(), 9);
        assert_eq!(c.frame_bytes(), Ok(32));
    }

    #[test]
    fn zero_dimension_is_invalid() {
        let c = DisplayConfig::DEFAULT.with_size(0, 240);
        assert_eq!(c.frame_bytes(), Err(FramebufferError::InvalidGeometry));
        let c = DisplayConfig::DEFAULT.with_size(320, 0);
        assert_eq!(c.frame_bytes(), Err(FramebufferError::InvalidGeometry));
    }

    #[test]
    fn depth_widths() {
        assert_eq!(PixelDepth::Rgb565.bytes(), 2);
        assert_eq!(PixelDepth::Rgb888.bytes(), 3);
        assert_eq!(PixelDepth::Argb8888.bytes(), 4);
    }
}
