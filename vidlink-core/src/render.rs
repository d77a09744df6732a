//! Display seam.
//!
//! The pipeline hands finished frames to a [`Renderer`] and moves on.
//! Rendering is best effort: a failed or absent display never stalls
//! reassembly or capture, so the trait returns nothing and
//! implementations log their own trouble.

use crate::frame::FrameBuffer;

/// Which on-screen window a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayTarget {
    /// Local capture preview.
    Local,
    /// Decoded frames from the peer.
    Remote,
}

/// Sink for finished frames. Implementations must tolerate geometry
/// changes between calls.
pub trait Renderer: Send {
    fn show(&mut self, target: DisplayTarget, frame: &FrameBuffer);
}

/// Renderer that discards everything. Used when the session runs
/// headless and in tests that only care about pipeline mechanics.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn show(&mut self, _target: DisplayTarget, _frame: &FrameBuffer) {}
}
