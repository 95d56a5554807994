//! `VoiceSession` — top-level lifecycle and interruption controller.
//!
//! ## Lifecycle
//!
//! ```text
//! VoiceSession::new()
//!     └─► start()            → mic open, capture loop spawned, phase = Active
//!         ├─► interrupt()    → engine torn down, cursor reset, phase = Interrupted
//!         │       └─► next assistant chunk lazily opens a fresh engine → Active
//!         └─► stop()         → capture stopped, engine closed, phase = Idle
//! ```
//!
//! `stop()` is idempotent teardown: every release step runs on every exit
//! path and a second call is a no-op. After `stop()` a new session may be
//! created and started without leaking device handles.
//!
//! ## Threading
//!
//! `cpal::Stream` is `!Send` on Windows/macOS, so the mic stream is created
//! *inside* `spawn_blocking` and never crosses a thread boundary; a sync
//! oneshot channel propagates open-device errors back to the `start()`
//! caller. The playback cursor and the engine handle are written only from
//! the event-handling context, serialised by their mutexes.

pub mod capture;
pub mod scheduler;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::{
    audio::MicCapture,
    buffering::create_audio_ring,
    chatstate::{StoreHandle, UiContextSource},
    error::{ColloquyError, Result},
    output::{OutputFactory, PlaybackDiagnostics, PlaybackSnapshot},
    session::{
        capture::{CaptureContext, CaptureDiagnostics, CaptureSnapshot},
        scheduler::PlaybackCursor,
    },
    wire::{self, codec, ChannelTransport, InboundEvent, OutboundEvent},
};

/// Status broadcast capacity: 64 events buffered for slow consumers.
const BROADCAST_CAP: usize = 64;

/// Configuration for `VoiceSession`.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Preferred capture device name; `None` uses default input selection.
    pub preferred_input_device: Option<String>,
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Created or torn down; no device held.
    Idle,
    /// Capturing; playback engine opens lazily on the first assistant chunk.
    Active,
    /// Assistant turn cancelled; engine gone, cursor zeroed.
    Interrupted,
}

/// Emitted on the status channel when the session phase changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusEvent {
    pub phase: SessionPhase,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// The top-level session handle.
///
/// `VoiceSession` is `Send + Sync` — all fields use interior mutability.
/// Wrap in `Arc<VoiceSession>` to share between the host's event plumbing
/// and the inbound-dispatch task.
pub struct VoiceSession {
    config: SessionConfig,
    channel: Arc<dyn ChannelTransport>,
    output_factory: Arc<dyn OutputFactory>,
    store: StoreHandle,
    ui: Arc<dyn UiContextSource>,
    /// `true` while the capture loop is active.
    running: Arc<AtomicBool>,
    /// Latched by `stop()`, cleared by `start()`. A torn-down session drops
    /// straggler audio instead of reacquiring a device handle.
    torn_down: AtomicBool,
    phase: Mutex<SessionPhase>,
    /// Lazily-opened playback engine; `None` until the first assistant chunk
    /// and again after every interruption or teardown.
    engine: Mutex<Option<Box<dyn crate::output::AudioOutput>>>,
    /// "Next available start time" on the current engine's clock.
    cursor: Mutex<PlaybackCursor>,
    status_tx: broadcast::Sender<SessionStatusEvent>,
    capture_diagnostics: Arc<CaptureDiagnostics>,
    playback_diagnostics: Arc<PlaybackDiagnostics>,
}

impl VoiceSession {
    /// Create a session. Holds no device resources until `start()`.
    pub fn new(
        config: SessionConfig,
        channel: Arc<dyn ChannelTransport>,
        output_factory: Arc<dyn OutputFactory>,
        store: StoreHandle,
        ui: Arc<dyn UiContextSource>,
    ) -> Self {
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            config,
            channel,
            output_factory,
            store,
            ui,
            running: Arc::new(AtomicBool::new(false)),
            torn_down: AtomicBool::new(false),
            phase: Mutex::new(SessionPhase::Idle),
            engine: Mutex::new(None),
            cursor: Mutex::new(PlaybackCursor::new()),
            status_tx,
            capture_diagnostics: Arc::new(CaptureDiagnostics::default()),
            playback_diagnostics: Arc::new(PlaybackDiagnostics::default()),
        }
    }

    /// Start microphone capture and the outbound chunk pipeline.
    ///
    /// Blocks until the capture device is confirmed open (or fails), then
    /// returns; the pipeline continues on a background blocking thread. Must
    /// be called within a Tokio runtime.
    ///
    /// # Errors
    /// - `AlreadyRunning` if the session is already active.
    /// - `NoDefaultInputDevice` / `AudioDevice` / `AudioStream` when the
    ///   capture device cannot be acquired — the capability failure is
    ///   reported once and capture does not start.
    pub fn start(&self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(ColloquyError::AlreadyRunning);
        }

        self.capture_diagnostics.reset();
        self.playback_diagnostics.reset();
        self.torn_down.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);

        let (producer, consumer) = create_audio_ring();

        let channel = Arc::clone(&self.channel);
        let running = Arc::clone(&self.running);
        let diagnostics = Arc::clone(&self.capture_diagnostics);
        let preferred = self.config.preferred_input_device.clone();

        // Sync oneshot: the capture thread signals open success/failure.
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<u32>>();

        tokio::task::spawn_blocking(move || {
            // Mic must open on THIS thread — cpal::Stream is !Send.
            let mic = match MicCapture::open_with_preference(
                producer,
                Arc::clone(&running),
                preferred.as_deref(),
            ) {
                Ok(m) => {
                    let _ = open_tx.send(Ok(m.sample_rate));
                    m
                }
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };

            capture::run(CaptureContext {
                channel,
                consumer,
                running,
                capture_sample_rate: mic.sample_rate,
                diagnostics,
            });

            // Stream drops here, releasing the mic on this thread.
            drop(mic);
        });

        match open_rx.recv() {
            Ok(Ok(rate)) => {
                self.set_phase(SessionPhase::Active, None);
                info!(capture_rate = rate, "session started — capturing");
                Ok(())
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_phase(SessionPhase::Idle, Some(e.to_string()));
                Err(e)
            }
            Err(_) => {
                // Channel closed before a message — the blocking task died.
                self.running.store(false, Ordering::SeqCst);
                self.set_phase(SessionPhase::Idle, Some("capture failed to start".into()));
                Err(ColloquyError::Other(anyhow::anyhow!(
                    "capture task died unexpectedly"
                )))
            }
        }
    }

    /// Dispatch one parsed inbound channel event.
    ///
    /// This is the pipeline error boundary: nothing here is fatal to the
    /// host. Packet-local failures drop the packet and continue; engine
    /// failures skip the item.
    pub fn handle_inbound(&self, event: InboundEvent) {
        match event {
            InboundEvent::AssistantAudioChunk { audio } => self.handle_assistant_audio(&audio),
            InboundEvent::AssistantResponseStopped => self.interrupt(),
            InboundEvent::AssistantInputReceived => self.publish_ui_snapshot(),
            InboundEvent::AssistantMemoryUpdated(update) => {
                debug!("forwarding memory update to chat-state store");
                self.store.0.lock().apply_memory_update(update);
            }
            InboundEvent::AssistantMessageFinalized { message_id } => {
                debug!(message_id = %message_id, "forwarding finalized message");
                self.store.0.lock().finalize_message(&message_id);
            }
        }
    }

    /// Drain a receiver of inbound events on the Tokio executor.
    ///
    /// Convenience plumbing for hosts that deliver channel events through an
    /// mpsc queue; per-event failures are already absorbed by
    /// `handle_inbound`.
    pub fn spawn_inbound_loop(
        self: &Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<InboundEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                session.handle_inbound(event);
            }
            debug!("inbound event stream closed");
        })
    }

    /// Barge-in: discard every scheduled-but-unplayed item *now*.
    ///
    /// The engine that held the schedule is torn down, so nothing drains;
    /// the cursor resets to zero and the next arriving chunk opens a fresh
    /// engine and plays immediately.
    pub fn interrupt(&self) {
        let mut engine = self.engine.lock();
        let mut cursor = self.cursor.lock();

        if let Some(mut e) = engine.take() {
            e.close();
        }
        cursor.reset();
        self.playback_diagnostics
            .interrupts
            .fetch_add(1, Ordering::Relaxed);

        let mut phase = self.phase.lock();
        if *phase == SessionPhase::Active {
            *phase = SessionPhase::Interrupted;
            drop(phase);
            let _ = self.status_tx.send(SessionStatusEvent {
                phase: SessionPhase::Interrupted,
                detail: Some("assistant response stopped".into()),
            });
        }
        info!("playback interrupted — schedule discarded");
    }

    /// Tear the session down: stop capture, close the engine, zero the
    /// cursor. Idempotent — a second call is a no-op and nothing is released
    /// twice. All steps run even if one fails.
    pub fn stop(&self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        self.torn_down.store(true, Ordering::SeqCst);

        if let Some(mut e) = self.engine.lock().take() {
            e.close();
        }
        self.cursor.lock().reset();

        let mut phase = self.phase.lock();
        let was_idle = *phase == SessionPhase::Idle;
        *phase = SessionPhase::Idle;
        drop(phase);

        if was_running || !was_idle {
            self.set_phase(SessionPhase::Idle, None);
            info!("session stopped");
        }
    }

    /// Current session phase (snapshot).
    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock()
    }

    /// Subscribe to phase-change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<SessionStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Capture-side counters for observability.
    pub fn capture_diagnostics_snapshot(&self) -> CaptureSnapshot {
        self.capture_diagnostics.snapshot()
    }

    /// Playback-side counters for observability.
    pub fn playback_diagnostics_snapshot(&self) -> PlaybackSnapshot {
        self.playback_diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn handle_assistant_audio(&self, audio: &str) {
        // A stopped session stays stopped: stragglers still in flight on the
        // channel must not reacquire a device handle.
        if self.torn_down.load(Ordering::SeqCst) {
            debug!("session torn down — dropping straggler audio chunk");
            return;
        }

        // Decode before touching the engine: a bad or empty packet must
        // never open a device or reach the scheduler.
        let samples = match codec::decode_packet(audio) {
            Ok(s) => s,
            Err(e) => {
                self.playback_diagnostics
                    .packets_dropped
                    .fetch_add(1, Ordering::Relaxed);
                warn!("dropping inbound packet: {e}");
                return;
            }
        };
        self.playback_diagnostics
            .packets_decoded
            .fetch_add(1, Ordering::Relaxed);

        let samples = codec::widen_samples(&samples);
        let duration = samples.len() as f64 / f64::from(wire::SAMPLE_RATE);

        let mut engine = self.engine.lock();
        if engine.is_none() {
            match self.output_factory.open(wire::SAMPLE_RATE) {
                Ok(e) => {
                    debug!("playback engine opened lazily");
                    *engine = Some(e);

                    let mut phase = self.phase.lock();
                    if *phase == SessionPhase::Interrupted {
                        *phase = SessionPhase::Active;
                        drop(phase);
                        let _ = self.status_tx.send(SessionStatusEvent {
                            phase: SessionPhase::Active,
                            detail: None,
                        });
                    }
                }
                Err(e) => {
                    self.playback_diagnostics
                        .engine_errors
                        .fetch_add(1, Ordering::Relaxed);
                    error!("failed to open playback engine: {e}");
                    return;
                }
            }
        }
        let Some(engine_ref) = engine.as_mut() else {
            return;
        };

        let mut cursor = self.cursor.lock();
        let before = cursor.next_start();
        let now = engine_ref.now();
        let start = cursor.schedule(now, duration);
        if before > 0.0 && now >= before {
            self.playback_diagnostics
                .underruns
                .fetch_add(1, Ordering::Relaxed);
            debug!(late_by = now - before, "underrun — re-anchoring schedule to now");
        }

        match engine_ref.enqueue_at(start, samples) {
            Ok(()) => {
                self.playback_diagnostics
                    .items_scheduled
                    .fetch_add(1, Ordering::Relaxed);
                debug!(start, duration, "item scheduled");
            }
            Err(e) => {
                // Item skipped; the engine stays up for the next one.
                self.playback_diagnostics
                    .engine_errors
                    .fetch_add(1, Ordering::Relaxed);
                warn!("engine rejected item, skipping: {e}");
            }
        }
    }

    fn publish_ui_snapshot(&self) {
        let text = self.ui.snapshot();
        if let Err(e) = self
            .channel
            .publish(OutboundEvent::UiContextSnapshot { text })
        {
            warn!("ui context snapshot publish failed: {e}");
        }
    }

    fn set_phase(&self, new_phase: SessionPhase, detail: Option<String>) {
        *self.phase.lock() = new_phase;
        let _ = self.status_tx.send(SessionStatusEvent {
            phase: new_phase,
            detail,
        });
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        // Unmount path: same guaranteed release as an explicit stop().
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use approx::assert_abs_diff_eq;
    use serde_json::Value;

    use crate::buffering::chunk::PcmChunk;
    use crate::chatstate::ChatStateStore;
    use crate::output::AudioOutput;
    use crate::wire::MemoryUpdate;

    #[derive(Default)]
    struct RecordingChannel {
        events: Mutex<Vec<OutboundEvent>>,
    }

    impl ChannelTransport for RecordingChannel {
        fn publish(&self, event: OutboundEvent) -> Result<()> {
            self.events.lock().push(event);
            Ok(())
        }
    }

    /// Scripted playback engine: shared clock cell, records enqueues/closes.
    #[derive(Default)]
    struct FakeBackend {
        clock: Mutex<f64>,
        enqueued: Mutex<Vec<(f64, usize)>>,
        opens: AtomicUsize,
        closes: AtomicUsize,
        /// When set, `enqueue_at` rejects items with an engine error.
        fail_enqueues: AtomicBool,
    }

    struct FakeOutput {
        backend: Arc<FakeBackend>,
    }

    impl AudioOutput for FakeOutput {
        fn now(&self) -> f64 {
            *self.backend.clock.lock()
        }

        fn enqueue_at(&mut self, start: f64, samples: Vec<f32>) -> Result<()> {
            if self.backend.fail_enqueues.load(Ordering::Relaxed) {
                return Err(ColloquyError::Engine("device buffer rejected item".into()));
            }
            self.backend.enqueued.lock().push((start, samples.len()));
            Ok(())
        }

        fn close(&mut self) {
            self.backend.closes.fetch_add(1, Ordering::Relaxed);
        }
    }

    struct FakeFactory {
        backend: Arc<FakeBackend>,
    }

    impl OutputFactory for FakeFactory {
        fn open(&self, _sample_rate: u32) -> Result<Box<dyn AudioOutput>> {
            self.backend.opens.fetch_add(1, Ordering::Relaxed);
            // A fresh engine starts its clock at zero.
            *self.backend.clock.lock() = 0.0;
            Ok(Box::new(FakeOutput {
                backend: Arc::clone(&self.backend),
            }))
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        memory_updates: Vec<MemoryUpdate>,
        finalized: Vec<String>,
    }

    impl ChatStateStore for Arc<Mutex<RecordingStore>> {
        fn apply_memory_update(&mut self, update: MemoryUpdate) {
            self.lock().memory_updates.push(update);
        }

        fn finalize_message(&mut self, message_id: &str) {
            self.lock().finalized.push(message_id.to_owned());
        }
    }

    struct StaticContext(&'static str);

    impl UiContextSource for StaticContext {
        fn snapshot(&self) -> String {
            self.0.to_owned()
        }
    }

    struct Fixture {
        session: VoiceSession,
        channel: Arc<RecordingChannel>,
        backend: Arc<FakeBackend>,
        store: Arc<Mutex<RecordingStore>>,
    }

    fn fixture() -> Fixture {
        let channel = Arc::new(RecordingChannel::default());
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(Mutex::new(RecordingStore::default()));
        let session = VoiceSession::new(
            SessionConfig::default(),
            Arc::clone(&channel) as Arc<dyn ChannelTransport>,
            Arc::new(FakeFactory {
                backend: Arc::clone(&backend),
            }),
            StoreHandle::new(Arc::clone(&store)),
            Arc::new(StaticContext("screen: chat open, 2 drafts")),
        );
        Fixture {
            session,
            channel,
            backend,
            store,
        }
    }

    /// base64 packet of a 100 ms chunk of silence.
    fn packet_100ms() -> String {
        codec::encode_chunk(&PcmChunk::new(
            vec![0i16; wire::SAMPLES_PER_CHUNK],
            wire::SAMPLE_RATE,
        ))
    }

    fn audio_event() -> InboundEvent {
        InboundEvent::AssistantAudioChunk {
            audio: packet_100ms(),
        }
    }

    #[test]
    fn engine_opens_lazily_on_first_audio_item() {
        let fx = fixture();
        assert_eq!(fx.backend.opens.load(Ordering::Relaxed), 0);

        fx.session.handle_inbound(audio_event());
        assert_eq!(fx.backend.opens.load(Ordering::Relaxed), 1);

        fx.session.handle_inbound(audio_event());
        assert_eq!(fx.backend.opens.load(Ordering::Relaxed), 1, "engine reused");
    }

    #[test]
    fn back_to_back_items_get_gapless_schedule() {
        let fx = fixture();
        for _ in 0..3 {
            fx.session.handle_inbound(audio_event());
        }

        let enqueued = fx.backend.enqueued.lock();
        assert_eq!(enqueued.len(), 3);
        assert_abs_diff_eq!(enqueued[0].0, 0.0);
        assert_abs_diff_eq!(enqueued[1].0, 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(enqueued[2].0, 0.2, epsilon = 1e-9);
        assert!(enqueued.iter().all(|&(_, len)| len == wire::SAMPLES_PER_CHUNK));
    }

    #[test]
    fn late_item_is_clamped_to_now_not_scheduled_in_the_past() {
        let fx = fixture();
        fx.session.handle_inbound(audio_event()); // [0.0, 0.1)

        *fx.backend.clock.lock() = 0.35; // queue ran dry 250 ms ago
        fx.session.handle_inbound(audio_event());

        let enqueued = fx.backend.enqueued.lock();
        assert_abs_diff_eq!(enqueued[1].0, 0.35);
        assert_eq!(
            fx.session.playback_diagnostics_snapshot().underruns,
            1
        );
    }

    #[test]
    fn interrupt_discards_schedule_and_next_item_starts_fresh() {
        let fx = fixture();
        fx.session.handle_inbound(audio_event());
        fx.session.handle_inbound(audio_event()); // next_start = 0.2

        fx.session
            .handle_inbound(InboundEvent::AssistantResponseStopped);
        assert_eq!(fx.backend.closes.load(Ordering::Relaxed), 1);

        // Clock would have been at 0.15 mid-playback; a fresh engine resets it.
        fx.session.handle_inbound(audio_event());

        let enqueued = fx.backend.enqueued.lock();
        assert_eq!(fx.backend.opens.load(Ordering::Relaxed), 2);
        assert_abs_diff_eq!(enqueued[2].0, 0.0, epsilon = 1e-9);
        assert_eq!(
            fx.session.playback_diagnostics_snapshot().interrupts,
            1
        );
    }

    #[test]
    fn malformed_packet_is_dropped_without_opening_an_engine() {
        let fx = fixture();
        fx.session.handle_inbound(InboundEvent::AssistantAudioChunk {
            audio: "!!not-base64!!".into(),
        });
        fx.session.handle_inbound(InboundEvent::AssistantAudioChunk {
            audio: String::new(), // decodes to zero samples
        });

        assert_eq!(fx.backend.opens.load(Ordering::Relaxed), 0);
        let snap = fx.session.playback_diagnostics_snapshot();
        assert_eq!(snap.packets_dropped, 2);
        assert_eq!(snap.items_scheduled, 0);

        // The pipeline keeps going: a good packet still plays.
        fx.session.handle_inbound(audio_event());
        assert_eq!(fx.session.playback_diagnostics_snapshot().items_scheduled, 1);
    }

    #[test]
    fn memory_and_finalize_events_are_forwarded_to_the_store() {
        let fx = fixture();

        let update: MemoryUpdate =
            serde_json::from_value(serde_json::json!({"topic": "travel"})).unwrap();
        fx.session
            .handle_inbound(InboundEvent::AssistantMemoryUpdated(update));
        fx.session
            .handle_inbound(InboundEvent::AssistantMessageFinalized {
                message_id: "msg-9".into(),
            });

        let store = fx.store.lock();
        assert_eq!(store.memory_updates.len(), 1);
        assert_eq!(
            store.memory_updates[0].metadata["topic"],
            Value::String("travel".into())
        );
        assert_eq!(store.finalized, vec!["msg-9".to_owned()]);
    }

    #[test]
    fn input_received_publishes_a_ui_snapshot() {
        let fx = fixture();
        fx.session
            .handle_inbound(InboundEvent::AssistantInputReceived);

        let events = fx.channel.events.lock();
        assert_eq!(
            events.as_slice(),
            &[OutboundEvent::UiContextSnapshot {
                text: "screen: chat open, 2 drafts".into()
            }]
        );
    }

    #[test]
    fn stop_is_idempotent_and_releases_the_engine_once() {
        let fx = fixture();
        fx.session.handle_inbound(audio_event());
        assert_eq!(fx.backend.opens.load(Ordering::Relaxed), 1);

        fx.session.stop();
        fx.session.stop();

        assert_eq!(fx.backend.closes.load(Ordering::Relaxed), 1);
        assert_eq!(fx.session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn audio_after_stop_is_dropped_without_reopening_an_engine() {
        let fx = fixture();
        fx.session.handle_inbound(audio_event());
        assert_eq!(fx.backend.opens.load(Ordering::Relaxed), 1);

        fx.session.stop();
        // Straggler still in flight on the channel when teardown ran.
        fx.session.handle_inbound(audio_event());

        assert_eq!(
            fx.backend.opens.load(Ordering::Relaxed),
            1,
            "torn-down session must not reacquire a device handle"
        );
        assert_eq!(fx.backend.enqueued.lock().len(), 1);
        assert_eq!(fx.session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn failing_enqueue_skips_the_item_and_keeps_the_engine() {
        let fx = fixture();
        fx.backend.fail_enqueues.store(true, Ordering::Relaxed);
        fx.session.handle_inbound(audio_event());

        let snap = fx.session.playback_diagnostics_snapshot();
        assert_eq!(snap.engine_errors, 1);
        assert_eq!(snap.items_scheduled, 0);
        assert!(fx.backend.enqueued.lock().is_empty());

        // The engine stays usable: the next good item schedules on it.
        fx.backend.fail_enqueues.store(false, Ordering::Relaxed);
        fx.session.handle_inbound(audio_event());

        assert_eq!(
            fx.backend.opens.load(Ordering::Relaxed),
            1,
            "engine must not be reopened after a skipped item"
        );
        assert_eq!(fx.session.playback_diagnostics_snapshot().items_scheduled, 1);
        assert_eq!(fx.backend.enqueued.lock().len(), 1);
    }

    #[test]
    fn interrupt_before_any_playback_is_harmless() {
        let fx = fixture();
        fx.session
            .handle_inbound(InboundEvent::AssistantResponseStopped);

        assert_eq!(fx.backend.closes.load(Ordering::Relaxed), 0);
        fx.session.handle_inbound(audio_event());
        assert_abs_diff_eq!(fx.backend.enqueued.lock()[0].0, 0.0);
    }

    #[test]
    fn session_phase_serializes_lowercase() {
        let json = serde_json::to_value(SessionStatusEvent {
            phase: SessionPhase::Interrupted,
            detail: None,
        })
        .unwrap();
        assert_eq!(json["phase"], "interrupted");
    }
}
