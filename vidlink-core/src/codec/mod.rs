//! Codec capability seam.
//!
//! A [`VideoCodec`] turns pixel buffers into a compressed bitstream
//! and back, and owns the format-specific knowledge of how that
//! bitstream is carried in fragments:
//!
//! - `encode` / `decode` — frame ↔ bitstream;
//! - `fragment` — split an encoded bitstream into MTU-bounded,
//!   sequence-numbered fragments (default: plain split);
//! - `extract` — append the useful bytes of one inbound fragment to a
//!   reassembly buffer (default: append the whole payload).
//!
//! Backends are keyed by name. The encoder lookup falls back to the
//! default codec so an unknown configured name never silences the
//! outbound direction; the decoder lookup is strict, because decoding
//! a format we do not understand is not recoverable — the session
//! disables inbound video instead.

mod raw;
mod zstd;

pub use raw::RawCodec;
pub use zstd::ZstdCodec;

use tracing::warn;

use crate::error::VideoError;
use crate::fragment::{Fragment, split_bitstream};
use crate::frame::{FrameBuffer, Geometry, PixelFormat};

/// Codec used when the configured name is unknown.
pub const DEFAULT_CODEC: &str = "zstd";

// ── CodecParams ──────────────────────────────────────────────────

/// Negotiated parameters handed to a codec at creation time.
#[derive(Debug, Clone, Copy)]
pub struct CodecParams {
    /// Frame geometry on the codec boundary (encoder input, decoder
    /// output).
    pub geometry: Geometry,
    /// Canonical pixel format on the codec boundary.
    pub pixel_format: PixelFormat,
    /// Target frames per second.
    pub fps: u32,
    /// Target bitrate in bits/second (hint).
    pub bitrate: u32,
    /// Quality knob, codec-specific meaning (lower = better here).
    pub quality: u8,
    /// Maximum payload size of one outbound fragment.
    pub mtu: usize,
}

impl CodecParams {
    /// Byte size of one full frame on the codec boundary.
    pub fn frame_size(&self) -> usize {
        self.pixel_format.frame_size(self.geometry)
    }
}

// ── VideoCodec ───────────────────────────────────────────────────

/// Format-specific encode/decode and fragment encapsulation.
///
/// Codec calls may be expensive but are synchronous and bounded; the
/// pipeline never holds its cursor lock across them.
pub trait VideoCodec: Send {
    fn name(&self) -> &'static str;

    /// Encode `input` into `output` (the encode-output buffer is
    /// reset first).
    fn encode(&mut self, input: &FrameBuffer, output: &mut FrameBuffer)
    -> Result<(), VideoError>;

    /// Split an encoded bitstream into transport units no larger than
    /// `mtu`, numbered consecutively from `first_seq`, marker on the
    /// last unit.
    fn fragment(&self, bitstream: &FrameBuffer, mtu: usize, first_seq: u16) -> Vec<Fragment> {
        split_bitstream(bitstream.payload(), mtu, first_seq)
    }

    /// Append the useful bitstream bytes of one fragment to `dest`.
    fn extract(&self, fragment: &Fragment, dest: &mut FrameBuffer) -> Result<(), VideoError> {
        dest.append(&fragment.payload)
    }

    /// Decode a reassembled bitstream into a full frame.
    fn decode(&mut self, bitstream: &FrameBuffer) -> Result<FrameBuffer, VideoError>;
}

// ── Registry ─────────────────────────────────────────────────────

fn build(name: &str, params: &CodecParams) -> Option<Box<dyn VideoCodec>> {
    if name.eq_ignore_ascii_case("zstd") {
        Some(Box::new(ZstdCodec::new(params)))
    } else if name.eq_ignore_ascii_case("raw") {
        Some(Box::new(RawCodec::new(params)))
    } else {
        None
    }
}

/// Whether a backend is registered under `name`.
pub fn is_supported(name: &str) -> bool {
    name.eq_ignore_ascii_case("zstd") || name.eq_ignore_ascii_case("raw")
}

/// Create the encoder-side codec for `name`, falling back to
/// [`DEFAULT_CODEC`] when the name is unknown.
pub fn create_encoder(name: &str, params: &CodecParams) -> Box<dyn VideoCodec> {
    match build(name, params) {
        Some(codec) => codec,
        None => {
            warn!(codec = name, fallback = DEFAULT_CODEC, "unknown codec, using fallback");
            Box::new(ZstdCodec::new(params))
        }
    }
}

/// Create the decoder-side codec for `name`. Strict: `None` means the
/// session cannot decode inbound video for this format.
pub fn create_decoder(name: &str, params: &CodecParams) -> Option<Box<dyn VideoCodec>> {
    build(name, params)
}

// ── Tests ────────────────────────────────────────────────────────
