//! Pass-through codec.
//!
//! Copies pixel data unmodified in both directions. Useful on links
//! with bandwidth to spare, and as the identity codec for exercising
//! the pipeline in tests.

use crate::codec::{CodecParams, VideoCodec};
use crate::error::VideoError;
use crate::frame::FrameBuffer;

/// Identity encode/decode: the bitstream *is* the frame.
pub struct RawCodec {
    params: CodecParams,
}

impl RawCodec {
    pub fn new(params: &CodecParams) -> Self {
        Self { params: *params }
    }
}

impl VideoCodec for RawCodec {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn encode(
        &mut self,
        input: &FrameBuffer,
        output: &mut FrameBuffer,
    ) -> Result<(), VideoError> {
        output.reset();
        output.append(input.payload())
    }

    fn decode(&mut self, bitstream: &FrameBuffer) -> Result<FrameBuffer, VideoError> {
        let expected = self.params.frame_size();
        if bitstream.used() != expected {
            return Err(VideoError::BitstreamSize {
                expected,
                actual: bitstream.used(),
            });
        }
        let mut frame = FrameBuffer::allocated(
            self.params.geometry,
            self.params.pixel_format,
            expected,
        )?;
        frame.append(bitstream.payload())?;
        Ok(frame)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Geometry, PixelFormat};

    fn params() -> CodecParams {
        CodecParams {
            geometry: Geometry::new(176, 144),
            pixel_format: PixelFormat::Yuv420p,
            fps: 15,
            bitrate: 65_000,
            quality: 3,
            mtu: 1400,
        }
    }

    #[test]
    fn round_trip_preserves_geometry_and_length() {
        let p = params();
        let size = p.frame_size();

        let mut input = FrameBuffer::for_format(p.geometry, p.pixel_format).unwrap();
        let pattern: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        input.append(&pattern).unwrap();

        let mut codec = RawCodec::new(&p);
        let mut bitstream = FrameBuffer::allocated(p.geometry, p.pixel_format, size).unwrap();
        codec.encode(&input, &mut bitstream).unwrap();

        let decoded = codec.decode(&bitstream).unwrap();
        assert_eq!(decoded.geometry(), p.geometry);
        assert_eq!(decoded.used(), size);
        assert_eq!(decoded.payload(), input.payload());
    }

    #[test]
    fn decode_rejects_wrong_size() {
        let p = params();
        let mut codec = RawCodec::new(&p);
        let mut short = FrameBuffer::allocated(p.geometry, p.pixel_format, 10).unwrap();
        short.append(&[0u8; 10]).unwrap();

        assert!(matches!(
            codec.decode(&short),
            Err(VideoError::BitstreamSize { .. })
        ));
    }
}
