//! # vidlink-core
//!
//! Bidirectional real-time video pipeline for point-to-point calls.
//!
//! This crate contains:
//! - **Frames**: `FrameBuffer`, `Geometry`, `PixelFormat` shared by every stage
//! - **Fragments**: `Fragment` and MTU-bounded bitstream splitting
//! - **Codec**: the `VideoCodec` seam with `zstd` and `raw` backends
//! - **Capture**: the `CaptureSource` seam and backend probe table
//! - **Convert**: software pixel conversion and rescaling
//! - **Inbound**: lock-light fragment reassembly ring, `Reassembler` and `RingDrain`
//! - **Outbound**: rate-limited capture, convert, encode, fragment
//! - **Session**: scheduler task wiring both directions with cooperative shutdown
//! - **Error**: `VideoError` — typed, `thiserror`-based error hierarchy

pub mod capture;
pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod fragment;
pub mod frame;
pub mod inbound;
pub mod outbound;
pub mod render;
pub mod session;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use capture::{CaptureSource, open_source};
pub use codec::{CodecParams, DEFAULT_CODEC, VideoCodec, create_decoder, create_encoder};
pub use config::{SessionConfig, parse_geometry};
pub use convert::{FrameConverter, ScalingConverter};
pub use error::VideoError;
pub use fragment::{Fragment, MIN_PAYLOAD, split_bitstream};
pub use frame::{FrameBuffer, Geometry, PixelFormat};
pub use inbound::{InboundRing, MIN_RING_SLOTS, PushOutcome, Reassembler, RingDrain};
pub use outbound::OutboundPipeline;
pub use render::{DisplayTarget, NullRenderer, Renderer};
pub use session::{SessionHandle, SessionScheduler, build, start};
