//! Inbound reassembly: fragments in, decoded frames out.
//!
//! Two actors share a fixed ring of bitstream buffers. The transport
//! side (the [`Reassembler`]) appends fragment payloads into the slot
//! under the fill cursor; the scheduler side (the [`RingDrain`])
//! decodes and displays the slot under the ready cursor. The cursor
//! lock is held only to read or swap indices, never across an append,
//! a decode, or a render call.
//!
//! Cursor invariant: the fill slot and the ready slot are never the
//! same index, so the two sides never contend on a slot mutex. A
//! `None` fill cursor means the ring is saturated and new fragments
//! are shed until the drain frees a slot; freshness wins over
//! completeness.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::codec::VideoCodec;
use crate::error::VideoError;
use crate::fragment::Fragment;
use crate::frame::{FrameBuffer, Geometry, PixelFormat};
use crate::render::{DisplayTarget, Renderer};

/// Smallest usable ring. Below this the drain and the fill trip over
/// each other as soon as one frame is in flight.
pub const MIN_RING_SLOTS: usize = 3;

/// Per-slot allocation for a reassembled bitstream: one full frame
/// plus compression headroom for incompressible input.
pub fn bitstream_capacity(frame_size: usize) -> usize {
    frame_size + frame_size / 255 + 512
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── InboundRing ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Cursors {
    /// Slot being filled by the transport side. `None` when saturated.
    fill: Option<usize>,
    /// Oldest completed slot awaiting decode. `None` when empty.
    ready: Option<usize>,
}

/// Fixed ring of bitstream buffers between transport and scheduler.
pub struct InboundRing {
    slots: Vec<Mutex<FrameBuffer>>,
    cursors: Mutex<Cursors>,
}

impl InboundRing {
    /// Build a ring of at least [`MIN_RING_SLOTS`] empty buffers.
    /// Slot data is allocated lazily on first use.
    pub fn new(slot_count: usize, geometry: Geometry, format: PixelFormat) -> Self {
        let n = slot_count.max(MIN_RING_SLOTS);
        let slots = (0..n)
            .map(|_| Mutex::new(FrameBuffer::new(geometry, format)))
            .collect();
        Self {
            slots,
            cursors: Mutex::new(Cursors {
                fill: Some(0),
                ready: None,
            }),
        }
    }

    fn next(&self, i: usize) -> usize {
        (i + 1) % self.slots.len()
    }

    /// Whether a slot is available for filling.
    pub fn fill_available(&self) -> bool {
        lock(&self.cursors).fill.is_some()
    }

    /// Run `f` on the current fill slot, or `None` when saturated.
    ///
    /// The fill cursor can only move away from `Some` on the caller's
    /// own side (via [`complete_fill`](Self::complete_fill)), so the
    /// index read here stays valid after the cursor lock drops.
    pub fn with_fill<R>(&self, f: impl FnOnce(&mut FrameBuffer) -> R) -> Option<R> {
        let idx = lock(&self.cursors).fill?;
        let mut slot = lock(&self.slots[idx]);
        Some(f(&mut slot))
    }

    /// Hand the filled slot to the drain side. Publishes it as ready
    /// (if nothing is pending) and advances the fill cursor, parking
    /// it at `None` when the next slot is still owned by the drain.
    pub fn complete_fill(&self) {
        let mut c = lock(&self.cursors);
        let Some(fill) = c.fill else { return };
        if c.ready.is_none() {
            c.ready = Some(fill);
        }
        let next = self.next(fill);
        c.fill = if Some(next) == c.ready { None } else { Some(next) };
    }

    /// Throw away a partial fill, keeping the slot and its allocation.
    pub fn abort_fill(&self) {
        let idx = lock(&self.cursors).fill;
        if let Some(idx) = idx {
            lock(&self.slots[idx]).reset();
        }
    }

    /// Run `f` on the oldest ready slot, or `None` when the ring is
    /// empty. The slot stays ready until
    /// [`recycle_ready`](Self::recycle_ready).
    pub fn with_ready<R>(&self, f: impl FnOnce(&FrameBuffer) -> R) -> Option<R> {
        let idx = lock(&self.cursors).ready?;
        let slot = lock(&self.slots[idx]);
        Some(f(&slot))
    }

    /// Free the oldest ready slot and advance the ready cursor. A
    /// saturated fill cursor is re-enabled on the freed slot.
    pub fn recycle_ready(&self) {
        let idx = match lock(&self.cursors).ready {
            Some(idx) => idx,
            None => return,
        };
        lock(&self.slots[idx]).release();

        let mut c = lock(&self.cursors);
        if c.fill.is_none() {
            c.fill = Some(idx);
        }
        let next = self.next(idx);
        c.ready = if Some(next) == c.fill { None } else { Some(next) };
    }
}

// ── Reassembler ──────────────────────────────────────────────────

/// What one [`Reassembler::push`] did with a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Payload appended to the frame under assembly.
    Stored,
    /// The fragment completed a frame; it was handed to the drain.
    FrameComplete,
    /// The fragment was shed (undersized, saturated ring, or mid-gap).
    Dropped,
    /// An end-of-frame marker closed a loss gap; the next fragment
    /// starts a fresh frame.
    Resynced,
}

/// Transport-side half of the inbound pipeline.
///
/// Tracks the expected sequence number and the accepting/discarding
/// state; on a sequence gap it sheds everything up to and including
/// the next end-of-frame marker, then resumes at `marker + 1`.
pub struct Reassembler {
    ring: Arc<InboundRing>,
    codec: Box<dyn VideoCodec>,
    slot_capacity: usize,
    expected_seq: u16,
    discarding: bool,
}

impl Reassembler {
    pub fn new(ring: Arc<InboundRing>, codec: Box<dyn VideoCodec>, slot_capacity: usize) -> Self {
        Self {
            ring,
            codec,
            slot_capacity,
            expected_seq: 0,
            discarding: false,
        }
    }

    /// Feed one inbound fragment.
    pub fn push(&mut self, frag: &Fragment) -> PushOutcome {
        if frag.is_undersized() {
            debug!(len = frag.payload.len(), "dropping undersized fragment");
            return PushOutcome::Dropped;
        }

        // Saturated ring: shed without touching sequence state. The
        // resulting gap is caught once a slot frees up.
        if !self.ring.fill_available() {
            debug!(seq = frag.sequence, "inbound ring saturated, shedding fragment");
            return PushOutcome::Dropped;
        }

        if !self.discarding && frag.sequence != self.expected_seq {
            debug!(
                seq = frag.sequence,
                expected = self.expected_seq,
                "sequence gap, discarding to end of frame"
            );
            self.discarding = true;
        }

        if self.discarding {
            if frag.end_marker {
                self.ring.abort_fill();
                self.expected_seq = frag.sequence.wrapping_add(1);
                self.discarding = false;
                return PushOutcome::Resynced;
            }
            return PushOutcome::Dropped;
        }

        self.expected_seq = frag.sequence.wrapping_add(1);

        if let Err(e) = self.extract(frag) {
            warn!(seq = frag.sequence, error = %e, "fragment extract failed, dropping frame");
            self.ring.abort_fill();
            // A marker ends the frame here anyway; without one, shed
            // the remainder of this frame.
            self.discarding = !frag.end_marker;
            return PushOutcome::Dropped;
        }

        if frag.end_marker {
            self.ring.complete_fill();
            return PushOutcome::FrameComplete;
        }
        PushOutcome::Stored
    }

    fn extract(&mut self, frag: &Fragment) -> Result<(), VideoError> {
        let capacity = self.slot_capacity;
        let codec = &self.codec;
        self.ring
            .with_fill(|slot| {
                if slot.capacity() == 0 {
                    slot.allocate(capacity)?;
                }
                codec.extract(frag, slot)
            })
            .unwrap_or(Err(VideoError::RingSaturated))
    }
}

// ── RingDrain ────────────────────────────────────────────────────

/// Scheduler-side half: decodes ready slots in order and shows them.
pub struct RingDrain {
    ring: Arc<InboundRing>,
    decoder: Box<dyn VideoCodec>,
}

impl RingDrain {
    pub fn new(ring: Arc<InboundRing>, decoder: Box<dyn VideoCodec>) -> Self {
        Self { ring, decoder }
    }

    /// Decode and display every ready frame. Undecodable frames are
    /// dropped; their slot is recycled either way. Returns the number
    /// of frames shown. Draining an empty ring is a no-op.
    pub fn drain(&mut self, renderer: &mut dyn Renderer) -> usize {
        let mut shown = 0;
        loop {
            let decoder = &mut self.decoder;
            let decoded = self.ring.with_ready(|bitstream| decoder.decode(bitstream));
            let Some(result) = decoded else { break };
            self.ring.recycle_ready();
            match result {
                Ok(frame) => {
                    renderer.show(DisplayTarget::Remote, &frame);
                    shown += 1;
                }
                Err(e) => warn!(error = %e, "dropping undecodable frame"),
            }
        }
        shown
    }
}

// ── Tests ────────────────────────────────────────────────────────
