//! Session assembly and the scheduler task.
//!
//! [`build`] wires the configured pieces into a [`SessionScheduler`]
//! and the transport-facing [`Reassembler`]; [`start`] additionally
//! spawns the scheduler on the Tokio runtime and returns a
//! [`SessionHandle`] for cooperative shutdown.
//!
//! The scheduler owns the whole outbound pipeline and the drain side
//! of the inbound ring. Each direction degrades independently: no
//! capture device means inbound-only, no decoder for the negotiated
//! codec means outbound-only, and either way the tick loop keeps
//! running.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::open_source;
use crate::codec::{CodecParams, create_decoder, create_encoder};
use crate::config::SessionConfig;
use crate::convert::ScalingConverter;
use crate::error::VideoError;
use crate::fragment::Fragment;
use crate::frame::PixelFormat;
use crate::inbound::{InboundRing, Reassembler, RingDrain, bitstream_capacity};
use crate::outbound::OutboundPipeline;
use crate::render::{DisplayTarget, Renderer};

// ── Assembly ─────────────────────────────────────────────────────

/// Wire up a session from its configuration.
///
/// Returns the scheduler plus the reassembler the transport should
/// feed inbound fragments into. The reassembler is `None` when no
/// decoder exists for the configured codec; the session then runs
/// outbound-only.
pub fn build(
    config: &SessionConfig,
    renderer: Box<dyn Renderer>,
    outbox: mpsc::Sender<Vec<Fragment>>,
) -> Result<(SessionScheduler, Option<Reassembler>), VideoError> {
    let params = CodecParams {
        geometry: config.video_geometry(),
        pixel_format: PixelFormat::Yuv420p,
        fps: config.fps,
        bitrate: config.bitrate,
        quality: config.quality,
        mtu: config.mtu,
    };

    let (drain, reassembler) = match create_decoder(&config.codec, &params) {
        Some(drain_codec) => {
            let ring = Arc::new(InboundRing::new(
                config.ring_slots,
                params.geometry,
                params.pixel_format,
            ));
            let capacity = bitstream_capacity(params.frame_size());
            // Two codec instances: extract runs on the transport side,
            // decode on the scheduler side.
            let extract_codec = match create_decoder(&config.codec, &params) {
                Some(c) => c,
                None => return Err(VideoError::CodecUnavailable(config.codec.clone())),
            };
            (
                Some(RingDrain::new(Arc::clone(&ring), drain_codec)),
                Some(Reassembler::new(ring, extract_codec, capacity)),
            )
        }
        None => {
            warn!(codec = %config.codec, "no decoder for codec, inbound video disabled");
            (None, None)
        }
    };

    let source = open_source(&config.device, config.camera_geometry(), config.fps);
    if source.is_none() {
        warn!(device = %config.device, "capture device unavailable, outbound video disabled");
    }
    let encoder = source
        .is_some()
        .then(|| create_encoder(&config.codec, &params));

    let outbound = OutboundPipeline::new(
        source,
        Box::new(ScalingConverter::new()),
        encoder,
        &params,
        config.send_video,
    )?;

    let scheduler = SessionScheduler {
        drain,
        outbound,
        renderer,
        outbox,
        tick: Duration::from_millis(config.tick_ms.max(1)),
        shutdown: CancellationToken::new(),
    };
    Ok((scheduler, reassembler))
}

/// [`build`] a session and spawn its scheduler.
pub fn start(
    config: &SessionConfig,
    renderer: Box<dyn Renderer>,
    outbox: mpsc::Sender<Vec<Fragment>>,
) -> Result<(SessionHandle, Option<Reassembler>), VideoError> {
    let (scheduler, reassembler) = build(config, renderer, outbox)?;
    let shutdown = scheduler.shutdown_token();
    let join = tokio::spawn(scheduler.run());
    Ok((SessionHandle { shutdown, join }, reassembler))
}

// ── SessionScheduler ─────────────────────────────────────────────

/// Periodic driver for both pipeline directions.
///
/// Every tick runs two phases in a fixed order: drain the inbound
/// ring, then advance the outbound pipeline. Both phases are plain
/// methods so tests can drive them without a runtime.
pub struct SessionScheduler {
    drain: Option<RingDrain>,
    outbound: OutboundPipeline,
    renderer: Box<dyn Renderer>,
    outbox: mpsc::Sender<Vec<Fragment>>,
    tick: Duration,
    shutdown: CancellationToken,
}

impl SessionScheduler {
    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Phase 1: decode and display everything the reassembler has
    /// completed since the last tick. Returns the number of frames
    /// shown.
    pub fn drain_inbound(&mut self) -> usize {
        match self.drain.as_mut() {
            Some(drain) => drain.drain(self.renderer.as_mut()),
            None => 0,
        }
    }

    /// Phase 2: capture if due, preview locally, encode and hand the
    /// fragments to the transport. A full outbox drops the frame
    /// rather than blocking the tick.
    pub fn outbound_tick(&mut self, now: Instant) {
        if !self.outbound.capture_tick(now) {
            return;
        }
        match self.outbound.prepare() {
            Some(preview) => self.renderer.show(DisplayTarget::Local, preview),
            None => return,
        }
        let Some(frags) = self.outbound.encode_and_fragment() else {
            return;
        };
        match self.outbox.try_send(frags) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!("outbound queue full, dropping frame");
            }
            Err(TrySendError::Closed(_)) => {
                warn!("outbound queue closed, disabling send");
                self.outbound.set_send_enabled(false);
            }
        }
    }

    /// Tick loop. Runs until the shutdown token fires, then releases
    /// capture and codec resources.
    pub async fn run(mut self) {
        info!(
            inbound = self.drain.is_some(),
            outbound = self.outbound.is_active(),
            tick_ms = self.tick.as_millis() as u64,
            "video session started"
        );
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.drain_inbound();
                    self.outbound_tick(Instant::now());
                }
            }
        }
        // Capture device first, then codecs, then the ring.
        self.outbound.release();
        self.drain = None;
        info!("video session stopped");
    }
}

// ── SessionHandle ────────────────────────────────────────────────

/// Owner-side handle to a running scheduler task.
pub struct SessionHandle {
    shutdown: CancellationToken,
    join: JoinHandle<()>,
}

impl SessionHandle {
    /// Request shutdown and wait up to `grace` for the scheduler to
    /// finish its tick and release its resources. A task that does
    /// not stop in time is aborted.
    pub async fn shutdown(mut self, grace: Duration) {
        self.shutdown.cancel();
        if tokio::time::timeout(grace, &mut self.join).await.is_err() {
            warn!("scheduler did not stop within grace period, aborting");
            self.join.abort();
        }
    }

    /// Whether the scheduler task has already exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Geometry;
    use crate::render::NullRenderer;
    use std::sync::Mutex;

    /// Renderer whose observations outlive the scheduler that owns it.
    #[derive(Clone, Default)]
    struct SharedRenderer {
        shown: Arc<Mutex<Vec<(DisplayTarget, Geometry)>>>,
    }

    impl Renderer for SharedRenderer {
        fn show(&mut self, target: DisplayTarget, frame: &crate::frame::FrameBuffer) {
            self.shown
                .lock()
                .unwrap()
                .push((target, frame.geometry()));
        }
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            video_size: "sqcif".into(),
            fps: 10,
            tick_ms: 10,
            ..SessionConfig::default()
        }
    }

    #[tokio::test]
    async fn loopback_round_trip() {
        let (tx, mut rx) = mpsc::channel(8);
        let renderer = SharedRenderer::default();
        let shown = Arc::clone(&renderer.shown);

        let (mut scheduler, reassembler) =
            build(&test_config(), Box::new(renderer), tx).unwrap();
        let mut reassembler = reassembler.unwrap();

        // One outbound tick captures, previews and emits fragments.
        scheduler.outbound_tick(Instant::now());
        let frags = rx.try_recv().expect("fragments on the outbox");
        assert!(frags.last().unwrap().end_marker);

        // Loop them back through the reassembler and drain.
        for f in &frags {
            reassembler.push(f);
        }
        assert_eq!(scheduler.drain_inbound(), 1);

        let shown = shown.lock().unwrap();
        let sqcif = Geometry::new(128, 96);
        assert!(shown.contains(&(DisplayTarget::Local, sqcif)));
        assert!(shown.contains(&(DisplayTarget::Remote, sqcif)));
    }

    #[tokio::test]
    async fn unknown_device_degrades_to_inbound_only() {
        let mut config = test_config();
        config.device = "/dev/nonexistent".into();
        let (tx, mut rx) = mpsc::channel(8);

        let (mut scheduler, reassembler) =
            build(&config, Box::new(NullRenderer), tx).unwrap();
        assert!(reassembler.is_some());

        scheduler.outbound_tick(Instant::now());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_codec_degrades_to_outbound_only() {
        let mut config = test_config();
        config.codec = "h264".into();
        let (tx, mut rx) = mpsc::channel(8);

        let (mut scheduler, reassembler) =
            build(&config, Box::new(NullRenderer), tx).unwrap();
        // Strict decoder lookup: inbound is off.
        assert!(reassembler.is_none());
        assert_eq!(scheduler.drain_inbound(), 0);

        // Encoder fell back to the default codec, so sending works.
        scheduler.outbound_tick(Instant::now());
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn full_outbox_drops_frames_without_blocking() {
        let (tx, _rx) = mpsc::channel(1);
        let (mut scheduler, _) = build(&test_config(), Box::new(NullRenderer), tx).unwrap();

        let t0 = Instant::now();
        scheduler.outbound_tick(t0);
        // Second frame finds the queue full; the call must return.
        scheduler.outbound_tick(t0 + Duration::from_millis(200));
    }

    #[tokio::test]
    async fn shutdown_is_bounded() {
        let (tx, _rx) = mpsc::channel(8);
        let (handle, _) = start(&test_config(), Box::new(NullRenderer), tx).unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_finished());

        tokio::time::timeout(
            Duration::from_secs(1),
            handle.shutdown(Duration::from_millis(500)),
        )
        .await
        .expect("shutdown completes within the grace period");
    }
}
