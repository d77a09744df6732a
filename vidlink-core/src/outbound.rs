//! Outbound pipeline: capture, convert, encode, fragment.
//!
//! Runs entirely on the scheduler task, so it owns its buffers
//! outright and needs no locking. Capture is rate limited to the
//! configured frame rate; conversion produces the canonical planar
//! YUV frame that both the preview and the encoder consume, so the
//! scale work happens once per captured frame.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::capture::CaptureSource;
use crate::codec::{CodecParams, VideoCodec};
use crate::convert::FrameConverter;
use crate::error::VideoError;
use crate::fragment::Fragment;
use crate::frame::FrameBuffer;
use crate::inbound::bitstream_capacity;

/// Capture-to-fragments half of a session.
pub struct OutboundPipeline {
    source: Option<Box<dyn CaptureSource>>,
    converter: Box<dyn FrameConverter>,
    encoder: Option<Box<dyn VideoCodec>>,
    /// Last captured frame, in the source's native format.
    loc_src: FrameBuffer,
    /// Canonical frame at the negotiated geometry.
    enc_in: FrameBuffer,
    /// Encoded bitstream, reused across frames.
    enc_out: FrameBuffer,
    fps: u32,
    mtu: usize,
    send_enabled: bool,
    last_capture: Option<Instant>,
    next_seq: u16,
}

impl OutboundPipeline {
    pub fn new(
        source: Option<Box<dyn CaptureSource>>,
        converter: Box<dyn FrameConverter>,
        encoder: Option<Box<dyn VideoCodec>>,
        params: &CodecParams,
        send_enabled: bool,
    ) -> Result<Self, VideoError> {
        let enc_in = FrameBuffer::for_format(params.geometry, params.pixel_format)?;
        let enc_out = FrameBuffer::allocated(
            params.geometry,
            params.pixel_format,
            bitstream_capacity(params.frame_size()),
        )?;
        Ok(Self {
            source,
            converter,
            encoder,
            loc_src: FrameBuffer::new(params.geometry, params.pixel_format),
            enc_in,
            enc_out,
            fps: params.fps.max(1),
            mtu: params.mtu,
            send_enabled,
            last_capture: None,
            next_seq: 0,
        })
    }

    /// Whether a capture source is attached.
    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    /// Enable or disable encoding without touching capture; the local
    /// preview keeps running either way.
    pub fn set_send_enabled(&mut self, enabled: bool) {
        self.send_enabled = enabled;
    }

    pub fn send_enabled(&self) -> bool {
        self.send_enabled
    }

    /// Shift the grab origin of a movable source.
    pub fn move_origin(&mut self, dx: i32, dy: i32) {
        if let Some(source) = self.source.as_mut() {
            source.move_origin(dx, dy);
        }
    }

    /// Poll the source if a capture is due. The first call always
    /// captures; afterwards at most one frame per `1/fps` passes.
    /// Returns whether a new frame was taken.
    pub fn capture_tick(&mut self, now: Instant) -> bool {
        let Some(source) = self.source.as_mut() else {
            return false;
        };
        let interval = Duration::from_secs(1) / self.fps;
        if let Some(last) = self.last_capture {
            if now.duration_since(last) < interval {
                return false;
            }
        }
        let Some(frame) = source.read() else {
            // Source not ready: retry on the next tick, no rate debit.
            return false;
        };
        self.loc_src = frame.clone();
        self.last_capture = Some(now);
        true
    }

    /// Convert the captured frame to the canonical format and
    /// geometry. The returned reference doubles as the local preview.
    pub fn prepare(&mut self) -> Option<&FrameBuffer> {
        if self.loc_src.is_empty() {
            return None;
        }
        if let Err(e) = self.converter.convert(&self.loc_src, &mut self.enc_in) {
            warn!(error = %e, "frame conversion failed");
            return None;
        }
        Some(&self.enc_in)
    }

    /// Encode the prepared frame and split it into fragments, with
    /// sequence numbers running on across frames. `None` when sending
    /// is off, no encoder is attached, or the encode failed.
    pub fn encode_and_fragment(&mut self) -> Option<Vec<Fragment>> {
        if !self.send_enabled || self.enc_in.is_empty() {
            return None;
        }
        let encoder = self.encoder.as_mut()?;
        if let Err(e) = encoder.encode(&self.enc_in, &mut self.enc_out) {
            warn!(error = %e, "frame encode failed");
            return None;
        }
        let frags = encoder.fragment(&self.enc_out, self.mtu, self.next_seq);
        self.next_seq = self.next_seq.wrapping_add(frags.len() as u16);
        Some(frags)
    }

    /// Drop the capture device and encoder and free the working
    /// buffers. The source goes first so the device is released before
    /// anything else winds down.
    pub fn release(&mut self) {
        self.source = None;
        self.encoder = None;
        self.loc_src.release();
        self.enc_in.release();
        self.enc_out.release();
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::open_source;
    use crate::codec::create_encoder;
    use crate::convert::ScalingConverter;
    use crate::frame::{Geometry, PixelFormat};

    const QCIF: Geometry = Geometry::new(176, 144);

    fn params() -> CodecParams {
        CodecParams {
            geometry: QCIF,
            pixel_format: PixelFormat::Yuv420p,
            fps: 10,
            bitrate: 65_000,
            quality: 3,
            mtu: 1400,
        }
    }

    fn pipeline(with_source: bool, send: bool) -> OutboundPipeline {
        let p = params();
        let source = with_source.then(|| open_source("test", QCIF, p.fps).unwrap());
        OutboundPipeline::new(
            source,
            Box::new(ScalingConverter::new()),
            Some(create_encoder("raw", &p)),
            &p,
            send,
        )
        .unwrap()
    }

    #[test]
    fn capture_is_rate_limited() {
        let mut out = pipeline(true, true);
        let t0 = Instant::now();

        // First call captures immediately.
        assert!(out.capture_tick(t0));
        // 10 fps means one frame per 100 ms.
        assert!(!out.capture_tick(t0 + Duration::from_millis(50)));
        assert!(!out.capture_tick(t0 + Duration::from_millis(99)));
        assert!(out.capture_tick(t0 + Duration::from_millis(100)));
    }

    #[test]
    fn capture_convert_encode_fragment() {
        let mut out = pipeline(true, true);
        assert!(out.capture_tick(Instant::now()));

        let preview = out.prepare().unwrap();
        assert_eq!(preview.geometry(), QCIF);
        assert_eq!(preview.used(), params().frame_size());

        let frags = out.encode_and_fragment().unwrap();
        let total: usize = frags.iter().map(|f| f.payload.len()).sum();
        assert_eq!(total, params().frame_size());
        assert!(frags.last().unwrap().end_marker);
        assert!(frags.iter().all(|f| f.payload.len() <= 1400));
    }

    #[test]
    fn sequence_numbers_run_on_across_frames() {
        let mut out = pipeline(true, true);
        let t0 = Instant::now();

        out.capture_tick(t0);
        out.prepare().unwrap();
        let first = out.encode_and_fragment().unwrap();

        out.capture_tick(t0 + Duration::from_millis(200));
        out.prepare().unwrap();
        let second = out.encode_and_fragment().unwrap();

        let expected = first.last().unwrap().sequence.wrapping_add(1);
        assert_eq!(second[0].sequence, expected);
    }

    #[test]
    fn send_disabled_still_previews() {
        let mut out = pipeline(true, false);
        out.capture_tick(Instant::now());
        assert!(out.prepare().is_some());
        assert!(out.encode_and_fragment().is_none());
    }

    #[test]
    fn no_source_means_inbound_only() {
        let mut out = pipeline(false, true);
        assert!(!out.is_active());
        assert!(!out.capture_tick(Instant::now()));
        assert!(out.prepare().is_none());
    }

    #[test]
    fn release_frees_buffers_and_device() {
        let mut out = pipeline(true, true);
        out.capture_tick(Instant::now());
        out.prepare().unwrap();

        out.release();
        assert!(!out.is_active());
        assert!(out.prepare().is_none());
        assert!(out.encode_and_fragment().is_none());
    }
}
