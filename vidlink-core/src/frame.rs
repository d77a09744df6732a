//! Frame buffers and pixel geometry shared by every pipeline stage.
//!
//! A [`FrameBuffer`] is owned by exactly one stage at a time (producer
//! or consumer). Handing a buffer to another stage is a move, never a
//! shared borrow across threads — the inbound ring enforces this with
//! its cursor invariant rather than with reference counting.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VideoError;

// ── Geometry ─────────────────────────────────────────────────────

/// Width and height of a video frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count.
    pub const fn pixels(self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layouts handled by the pipeline.
///
/// [`Yuv420p`](PixelFormat::Yuv420p) is the canonical encoder-input
/// format; the packed formats are what capture devices typically
/// deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Planar YUV 4:2:0: full-size Y plane, quarter-size U and V planes.
    Yuv420p,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb24,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba32,
    /// 2 bytes per pixel, 5-6-5 bit packing.
    Rgb565,
    /// Packed YUV 4:2:2, 2 bytes per pixel: Y0 Cb Y1 Cr.
    Yuyv422,
}

impl PixelFormat {
    /// Bytes per pixel for packed formats; `None` for planar layouts.
    pub const fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelFormat::Yuv420p => None,
            PixelFormat::Rgb24 => Some(3),
            PixelFormat::Rgba32 => Some(4),
            PixelFormat::Rgb565 | PixelFormat::Yuyv422 => Some(2),
        }
    }

    /// Byte size of one full frame at `geometry` in this format.
    pub const fn frame_size(self, geometry: Geometry) -> usize {
        let px = geometry.pixels();
        match self {
            PixelFormat::Yuv420p => px * 3 / 2,
            PixelFormat::Rgb24 => px * 3,
            PixelFormat::Rgba32 => px * 4,
            PixelFormat::Rgb565 | PixelFormat::Yuyv422 => px * 2,
        }
    }
}

// ── FrameBuffer ──────────────────────────────────────────────────

/// A typed, owned block of pixel or bitstream data.
///
/// Invariants:
/// - `used() <= capacity()` at all times;
/// - `capacity() > 0` iff the buffer holds an allocation;
/// - [`release`](Self::release) frees the data but preserves the
///   declared geometry and pixel format, so a ring slot keeps its
///   shape between frames.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    geometry: Geometry,
    format: PixelFormat,
    data: Vec<u8>,
    used: usize,
    end_marker: bool,
}

impl FrameBuffer {
    /// An empty, capacity-0 buffer with the given shape.
    pub fn new(geometry: Geometry, format: PixelFormat) -> Self {
        Self {
            geometry,
            format,
            data: Vec::new(),
            used: 0,
            end_marker: false,
        }
    }

    /// Allocate a zero-filled buffer of `capacity` bytes.
    pub fn allocated(
        geometry: Geometry,
        format: PixelFormat,
        capacity: usize,
    ) -> Result<Self, VideoError> {
        let mut buf = Self::new(geometry, format);
        buf.allocate(capacity)?;
        Ok(buf)
    }

    /// Allocate a buffer sized for one full frame in `format`.
    pub fn for_format(geometry: Geometry, format: PixelFormat) -> Result<Self, VideoError> {
        Self::allocated(geometry, format, format.frame_size(geometry))
    }

    /// (Re)allocate the data block. On failure the buffer is left in a
    /// zeroed, capacity-0 state; geometry and format are preserved.
    pub fn allocate(&mut self, capacity: usize) -> Result<(), VideoError> {
        self.data = Vec::new();
        self.used = 0;
        self.end_marker = false;
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| VideoError::Allocation { bytes: capacity })?;
        data.resize(capacity, 0);
        self.data = data;
        Ok(())
    }

    /// Clear `used` and the end marker without reallocating, so the
    /// buffer can be reused for the next frame.
    pub fn reset(&mut self) {
        self.used = 0;
        self.end_marker = false;
    }

    /// Free the owned data and zero the fill state, preserving the
    /// declared geometry and format.
    pub fn release(&mut self) {
        self.data = Vec::new();
        self.used = 0;
        self.end_marker = false;
    }

    /// Append bytes at the current fill position.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), VideoError> {
        let needed = self.used + bytes.len();
        if needed > self.data.len() {
            return Err(VideoError::CapacityExceeded {
                needed,
                capacity: self.data.len(),
            });
        }
        self.data[self.used..needed].copy_from_slice(bytes);
        self.used = needed;
        Ok(())
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// The filled portion of the buffer.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.used]
    }

    /// The full allocation, for stages that write by offset.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Mark `len` bytes as filled (for stages writing via
    /// [`as_mut_slice`](Self::as_mut_slice)). Clamped to capacity.
    pub fn set_used(&mut self, len: usize) {
        self.used = len.min(self.data.len());
    }

    pub fn end_marker(&self) -> bool {
        self.end_marker
    }

    pub fn set_end_marker(&mut self, marker: bool) {
        self.end_marker = marker;
    }
}

// ── Tests ────────────────────────────────────────────────────────
