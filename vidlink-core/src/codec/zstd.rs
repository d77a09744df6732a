//! Zstd bitstream codec.
//!
//! Lossless whole-frame compression: the encoder input buffer is
//! compressed with zstd and the decoder validates that the inflated
//! bitstream matches the negotiated frame size exactly, so a frame
//! reassembled across a loss event can never masquerade as valid.

use crate::codec::{CodecParams, VideoCodec};
use crate::error::VideoError;
use crate::frame::FrameBuffer;

/// Zstd-based frame codec.
pub struct ZstdCodec {
    params: CodecParams,
    /// zstd compression level (1 = fast, 9 = small).
    level: i32,
}

impl ZstdCodec {
    pub fn new(params: &CodecParams) -> Self {
        // The quality knob maps directly onto the compression level;
        // real-time use wants the low end.
        let level = i32::from(params.quality).clamp(1, 9);
        Self {
            params: *params,
            level,
        }
    }

    /// Effective compression level.
    pub fn level(&self) -> i32 {
        self.level
    }
}

impl VideoCodec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn encode(
        &mut self,
        input: &FrameBuffer,
        output: &mut FrameBuffer,
    ) -> Result<(), VideoError> {
        let compressed = zstd::encode_all(input.payload(), self.level)
            .map_err(|e| VideoError::Encode(format!("zstd: {e}")))?;
        output.reset();
        output.append(&compressed)
    }

    fn decode(&mut self, bitstream: &FrameBuffer) -> Result<FrameBuffer, VideoError> {
        let raw = zstd::decode_all(bitstream.payload())
            .map_err(|e| VideoError::Decode(format!("zstd: {e}")))?;

        let expected = self.params.frame_size();
        if raw.len() != expected {
            return Err(VideoError::BitstreamSize {
                expected,
                actual: raw.len(),
            });
        }

        let mut frame = FrameBuffer::allocated(
            self.params.geometry,
            self.params.pixel_format,
            expected,
        )?;
        frame.append(&raw)?;
        Ok(frame)
    }
}

// ── Tests ────────────────────────────────────────────────────────
