//! Blocking capture pipeline loop.
//!
//! ## Pipeline stages (per iteration)
//!
//! ```text
//! 1. Drain ring buffer → &[f32] at the device rate
//! 2. Resample to the 24 kHz transport rate
//! 3. Quantize f32 → i16
//! 4. FrameAccumulator::push — flush at the 100 ms threshold
//! 5. On flush: encode to base64, publish one `user-audio-chunk`
//! ```
//!
//! A wall-clock check flushes a partially filled buffer if the device stalls
//! mid-window, and the loop performs a terminal flush on stop so no captured
//! sample is lost. The whole loop runs in `spawn_blocking`, keeping the Tokio
//! executor free for the host's I/O.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::{
    audio::resample::RateConverter,
    buffering::{accumulator::FrameAccumulator, chunk::PcmChunk, AudioConsumer, Consumer},
    wire::{self, codec, ChannelTransport, OutboundEvent},
};

/// Samples drained from the ring per iteration: 20 ms at the transport rate.
const DRAIN_CHUNK: usize = 480;

/// Sleep when the ring is empty (avoids busy-wait burning a core).
const SLEEP_EMPTY_MS: u64 = 5;

#[derive(Debug, Default)]
pub struct CaptureDiagnostics {
    pub frames_in: AtomicUsize,
    pub frames_resampled: AtomicUsize,
    pub chunks_published: AtomicUsize,
    pub publish_errors: AtomicUsize,
    pub stall_flushes: AtomicUsize,
}

impl CaptureDiagnostics {
    pub fn reset(&self) {
        self.frames_in.store(0, Ordering::Relaxed);
        self.frames_resampled.store(0, Ordering::Relaxed);
        self.chunks_published.store(0, Ordering::Relaxed);
        self.publish_errors.store(0, Ordering::Relaxed);
        self.stall_flushes.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_resampled: self.frames_resampled.load(Ordering::Relaxed),
            chunks_published: self.chunks_published.load(Ordering::Relaxed),
            publish_errors: self.publish_errors.load(Ordering::Relaxed),
            stall_flushes: self.stall_flushes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CaptureSnapshot {
    pub frames_in: usize,
    pub frames_resampled: usize,
    pub chunks_published: usize,
    pub publish_errors: usize,
    pub stall_flushes: usize,
}

/// All context the capture loop needs, passed as one struct so the
/// `spawn_blocking` closure stays tidy.
pub struct CaptureContext {
    pub channel: Arc<dyn ChannelTransport>,
    pub consumer: AudioConsumer,
    pub running: Arc<AtomicBool>,
    pub capture_sample_rate: u32,
    pub diagnostics: Arc<CaptureDiagnostics>,
}

/// Run the blocking capture loop until `ctx.running` becomes false.
pub fn run(mut ctx: CaptureContext) {
    info!("capture pipeline started");

    let mut resampler = match RateConverter::to_transport(ctx.capture_sample_rate, DRAIN_CHUNK) {
        Ok(r) => r,
        Err(e) => {
            error!("failed to create resampler: {e}");
            return;
        }
    };

    // Scratch buffer, reused each iteration.
    let mut raw = vec![0f32; DRAIN_CHUNK];
    let mut accumulator = FrameAccumulator::new(wire::SAMPLES_PER_CHUNK, wire::SAMPLE_RATE);
    // When the first frame of the current window arrived.
    let mut window_started: Option<Instant> = None;

    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        // ── Stall fallback: flush a partial window past its deadline ──────
        if let Some(started) = window_started {
            if started.elapsed() >= Duration::from_millis(wire::CHUNK_INTERVAL_MS)
                && accumulator.buffered() > 0
            {
                if let Some(chunk) = accumulator.flush() {
                    ctx.diagnostics.stall_flushes.fetch_add(1, Ordering::Relaxed);
                    debug!(samples = chunk.samples.len(), "stall flush of partial window");
                    publish_chunk(&ctx, &chunk);
                }
                window_started = None;
            }
        }

        // ── Drain ring buffer ──────────────────────────────────────────────
        let n = ctx.consumer.pop_slice(&mut raw);

        if n == 0 {
            std::thread::sleep(Duration::from_millis(SLEEP_EMPTY_MS));
            continue;
        }

        ctx.diagnostics.frames_in.fetch_add(n, Ordering::Relaxed);

        // ── Resample to the transport rate ─────────────────────────────────
        let resampled = resampler.convert(&raw[..n]);
        if resampled.is_empty() {
            // Partial block — the converter is waiting for more input.
            continue;
        }
        ctx.diagnostics
            .frames_resampled
            .fetch_add(resampled.len(), Ordering::Relaxed);

        // ── Quantize and accumulate ───────────────────────────────────────
        let frame = codec::quantize_samples(&resampled);
        let was_empty = accumulator.buffered() == 0;

        match accumulator.push(&frame) {
            Some(chunk) => {
                publish_chunk(&ctx, &chunk);
                window_started = None;
            }
            None => {
                if was_empty && accumulator.buffered() > 0 {
                    window_started = Some(Instant::now());
                }
            }
        }
    }

    // Terminal flush: do not lose the tail of the user's speech when capture
    // stops mid-window. An empty buffer is a no-op.
    if let Some(chunk) = accumulator.flush() {
        debug!(samples = chunk.samples.len(), "terminal flush on stop");
        publish_chunk(&ctx, &chunk);
    }

    let snap = ctx.diagnostics.snapshot();
    info!(
        frames_in = snap.frames_in,
        frames_resampled = snap.frames_resampled,
        chunks_published = snap.chunks_published,
        publish_errors = snap.publish_errors,
        stall_flushes = snap.stall_flushes,
        "capture pipeline stopped — diagnostics"
    );
}

/// Encode one chunk and emit exactly one outbound event.
fn publish_chunk(ctx: &CaptureContext, chunk: &PcmChunk) {
    let audio = codec::encode_chunk(chunk);
    match ctx.channel.publish(OutboundEvent::UserAudioChunk { audio }) {
        Ok(()) => {
            ctx.diagnostics
                .chunks_published
                .fetch_add(1, Ordering::Relaxed);
            debug!(samples = chunk.samples.len(), "chunk published");
        }
        Err(e) => {
            ctx.diagnostics
                .publish_errors
                .fetch_add(1, Ordering::Relaxed);
            warn!("chunk publish failed: {e}");
        }
    }
}
