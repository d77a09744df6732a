//! Transport-boundary fragments.
//!
//! The core never sees RTP headers: the surrounding transport delivers
//! already-demultiplexed fragments carrying only a 16-bit sequence
//! number, an end-of-frame marker, and the payload bytes. Outbound,
//! the codec's fragment step produces the same shape for the transport
//! to enqueue.

use bytes::Bytes;

/// Payloads below this size carry no usable bitstream data and are
/// dropped on arrival.
pub const MIN_PAYLOAD: usize = 2;

// ── Fragment ─────────────────────────────────────────────────────

/// One transport-level unit of a compressed video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Wrapping 16-bit sequence number.
    pub sequence: u16,
    /// Set on the last fragment of a frame.
    pub end_marker: bool,
    /// Bitstream bytes carried by this fragment.
    pub payload: Bytes,
}

impl Fragment {
    pub fn new(sequence: u16, end_marker: bool, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            end_marker,
            payload: payload.into(),
        }
    }

    /// Whether the payload is too small to carry bitstream data.
    pub fn is_undersized(&self) -> bool {
        self.payload.len() < MIN_PAYLOAD
    }
}

// ── Splitting ────────────────────────────────────────────────────

/// Split an encoded bitstream into MTU-bounded fragments.
///
/// Fragments are numbered consecutively from `first_seq` (wrapping at
/// 16 bits) and the last one carries the end marker. An empty
/// bitstream produces no fragments.
pub fn split_bitstream(bitstream: &[u8], mtu: usize, first_seq: u16) -> Vec<Fragment> {
    if bitstream.is_empty() || mtu == 0 {
        return Vec::new();
    }
    let count = bitstream.len().div_ceil(mtu);
    bitstream
        .chunks(mtu)
        .enumerate()
        .map(|(i, chunk)| {
            Fragment::new(
                first_seq.wrapping_add(i as u16),
                i + 1 == count,
                Bytes::copy_from_slice(chunk),
            )
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_respects_mtu_and_marker() {
        let data = vec![0xAB; 3500];
        let frags = split_bitstream(&data, 1400, 10);

        assert_eq!(frags.len(), 3);
        assert_eq!(frags[0].payload.len(), 1400);
        assert_eq!(frags[1].payload.len(), 1400);
        assert_eq!(frags[2].payload.len(), 700);

        assert_eq!(frags[0].sequence, 10);
        assert_eq!(frags[2].sequence, 12);

        assert!(!frags[0].end_marker);
        assert!(!frags[1].end_marker);
        assert!(frags[2].end_marker);
    }

    #[test]
    fn split_wraps_sequence() {
        let data = vec![0u8; 100];
        let frags = split_bitstream(&data, 40, u16::MAX);
        assert_eq!(frags[0].sequence, u16::MAX);
        assert_eq!(frags[1].sequence, 0);
        assert_eq!(frags[2].sequence, 1);
    }

    #[test]
    fn split_empty_is_empty() {
        assert!(split_bitstream(&[], 1400, 0).is_empty());
    }

    #[test]
    fn byte_accounting_is_exact() {
        let data: Vec<u8> = (0..=255).cycle().take(4097).map(|b| b as u8).collect();
        let frags = split_bitstream(&data, 1400, 0);
        let total: usize = frags.iter().map(|f| f.payload.len()).sum();
        assert_eq!(total, data.len());
    }

    #[test]
    fn undersized_detection() {
        assert!(Fragment::new(0, false, Bytes::from_static(&[1])).is_undersized());
        assert!(!Fragment::new(0, false, Bytes::from_static(&[1, 2])).is_undersized());
    }
}
