//! Capture backend seam.
//!
//! Pixel sources (camera, screen, synthetic) sit behind the
//! [`CaptureSource`] trait. A small opener table maps a configured
//! device name to whichever backend claims it, in order — the same
//! shape as a driver probe list. OS-level grabbers are external
//! collaborators that plug in through [`open_source`]; the built-in
//! [`TestPatternSource`] keeps the pipeline runnable without any
//! device at all.

use tracing::debug;

use crate::frame::{FrameBuffer, Geometry, PixelFormat};

// ── CaptureSource ────────────────────────────────────────────────

/// A local video source.
///
/// Backends release their device on drop.
pub trait CaptureSource: Send {
    /// Pull the next frame if one is available.
    ///
    /// `None` means "not ready yet" — expected at high poll rates and
    /// never an error. The returned buffer is owned by the source and
    /// valid until the next `read`.
    fn read(&mut self) -> Option<&FrameBuffer>;

    /// Move the grab origin by `(dx, dy)`, clamping to the device
    /// bounds. Screen grabbers implement this; cameras ignore it.
    fn move_origin(&mut self, _dx: i32, _dy: i32) {}
}

// ── Opener table ─────────────────────────────────────────────────

type SourceOpener = fn(&str, Geometry, u32) -> Option<Box<dyn CaptureSource>>;

/// Probe order for capture backends. Each opener returns `None` when
/// the device name is not its to handle or the device cannot be
/// opened.
const OPENERS: &[SourceOpener] = &[TestPatternSource::open];

/// Try to open `device` at the requested geometry and frame rate.
///
/// Returns `None` when no backend claims the device; the caller
/// degrades the session to inbound-only.
pub fn open_source(device: &str, geometry: Geometry, fps: u32) -> Option<Box<dyn CaptureSource>> {
    for opener in OPENERS {
        if let Some(source) = opener(device, geometry, fps) {
            return Some(source);
        }
    }
    debug!(device, "no capture backend claimed device");
    None
}

// ── TestPatternSource ────────────────────────────────────────────

/// Synthetic moving-gradient source, device name `"test"`.
///
/// Produces RGB24 frames at the requested geometry; each read shifts
/// the pattern so motion is visible end to end.
pub struct TestPatternSource {
    frame: FrameBuffer,
    tick: u32,
}

impl TestPatternSource {
    fn open(device: &str, geometry: Geometry, _fps: u32) -> Option<Box<dyn CaptureSource>> {
        if !device.eq_ignore_ascii_case("test") {
            return None;
        }
        let frame = FrameBuffer::for_format(geometry, PixelFormat::Rgb24).ok()?;
        Some(Box::new(Self { frame, tick: 0 }))
    }
}

impl CaptureSource for TestPatternSource {
    fn read(&mut self) -> Option<&FrameBuffer> {
        let geometry = self.frame.geometry();
        let width = geometry.width as usize;
        let shift = self.tick as usize;

        let data = self.frame.as_mut_slice();
        for y in 0..geometry.height as usize {
            for x in 0..width {
                let i = (y * width + x) * 3;
                data[i] = ((x + shift) & 0xFF) as u8;
                data[i + 1] = ((y + shift) & 0xFF) as u8;
                data[i + 2] = (shift & 0xFF) as u8;
            }
        }
        let size = self.frame.capacity();
        self.frame.set_used(size);
        self.tick = self.tick.wrapping_add(1);
        Some(&self.frame)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const QCIF: Geometry = Geometry::new(176, 144);

    #[test]
    fn unknown_device_is_unclaimed() {
        assert!(open_source("/dev/video0", QCIF, 15).is_none());
    }

    #[test]
    fn test_pattern_produces_full_frames() {
        let mut src = open_source("test", QCIF, 15).unwrap();
        let frame = src.read().unwrap();
        assert_eq!(frame.geometry(), QCIF);
        assert_eq!(frame.format(), PixelFormat::Rgb24);
        assert_eq!(frame.used(), PixelFormat::Rgb24.frame_size(QCIF));
    }

    #[test]
    fn test_pattern_moves() {
        let mut src = open_source("TEST", QCIF, 15).unwrap();
        let a = src.read().unwrap().payload().to_vec();
        let b = src.read().unwrap().payload().to_vec();
        assert_ne!(a, b);
    }
}
