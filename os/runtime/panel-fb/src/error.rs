/// Failures reported by the framebuffer controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramebufferError {
    #[error("display geometry has a zero dimension or overflows")]
    InvalidGeometry,
    #[error("could not allocate framebuffer {index} ({bytes} bytes)")]
    OutOfMemory { index: u8, bytes: usize },
    #[error("region origin ({x}, {y}) lies outside the framebuffer")]
    GeometryOutOfBounds { x: u16, y: u16 },
    #[error("completion-signal mode needs a transfer signal")]
    MissingSignal,
    #[error("timed out waiting for the display transfer to finish")]
    TransferTimeout,
}
