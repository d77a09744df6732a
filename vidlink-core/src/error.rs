//! Domain-specific error types for the video pipeline.
//!
//! All fallible operations return `Result<T, VideoError>`.
//! Failure is always directional: inbound and outbound degrade
//! independently, so most variants are handled by disabling one
//! direction of the session rather than tearing the session down.

use thiserror::Error;

/// The canonical error type for the video pipeline.
#[derive(Debug, Error)]
pub enum VideoError {
    // ── Buffer errors ────────────────────────────────────────────
    /// A frame buffer or codec context could not be allocated.
    #[error("cannot allocate frame buffer of {bytes} bytes")]
    Allocation { bytes: usize },

    /// An append would overrun the buffer's fixed capacity.
    #[error("buffer capacity exceeded: need {needed} bytes, have {capacity}")]
    CapacityExceeded { needed: usize, capacity: usize },

    // ── Codec errors ─────────────────────────────────────────────
    /// No codec backend is registered under the negotiated name.
    #[error("no codec registered under '{0}'")]
    CodecUnavailable(String),

    /// The encoder rejected or failed on an input frame.
    #[error("encode failed: {0}")]
    Encode(String),

    /// The decoder rejected or failed on a reassembled bitstream.
    #[error("decode failed: {0}")]
    Decode(String),

    /// A decoded bitstream does not match the negotiated geometry.
    #[error("bitstream size mismatch: expected {expected} bytes, got {actual}")]
    BitstreamSize { expected: usize, actual: usize },

    // ── Fragment errors ──────────────────────────────────────────
    /// The fragment payload is too small to carry any bitstream data.
    #[error("fragment payload too small: {len} bytes")]
    MalformedFragment { len: usize },

    /// No fill slot is available; the inbound ring is saturated.
    #[error("inbound ring saturated")]
    RingSaturated,

    // ── Capture / conversion errors ──────────────────────────────
    /// No capture backend claimed the configured device.
    #[error("no capture backend claimed device '{0}'")]
    SourceUnavailable(String),

    /// The converter does not support the requested format pair.
    #[error("unsupported conversion: {0}")]
    Convert(&'static str),

    // ── Channel errors ───────────────────────────────────────────
    /// The outbound fragment queue was closed by the transport.
    #[error("outbound queue closed")]
    QueueClosed,
}

// ── Convenient From implementations ──────────────────────────────

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for VideoError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        VideoError::QueueClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = VideoError::Allocation { bytes: 152064 };
        assert!(e.to_string().contains("152064"));

        let e = VideoError::CapacityExceeded {
            needed: 2000,
            capacity: 1400,
        };
        assert!(e.to_string().contains("2000"));
        assert!(e.to_string().contains("1400"));

        assert_eq!(
            VideoError::RingSaturated.to_string(),
            "inbound ring saturated"
        );
    }

    #[test]
    fn from_send_error() {
        let (tx, rx) = tokio::sync::mpsc::channel::<u8>(1);
        drop(rx);
        let send_err = tx.try_send(1).unwrap_err();
        if let tokio::sync::mpsc::error::TrySendError::Closed(_) = send_err {
            let e: VideoError = tokio::sync::mpsc::error::SendError(1u8).into();
            assert!(matches!(e, VideoError::QueueClosed));
        } else {
            panic!("expected closed channel");
        }
    }
}
