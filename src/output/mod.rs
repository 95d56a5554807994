//! Playback output abstraction.
//!
//! The `AudioOutput` trait is the seam between the scheduling logic and the
//! platform audio engine: a monotonic sample clock plus a sink that plays
//! items at requested clock positions. The session creates one lazily via
//! `OutputFactory` on the first decoded item — device resources are not held
//! before audio is actually needed — and drops it on interruption, which
//! discards every scheduled-but-unplayed item at once.

pub mod device;

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::Result;

/// A playback engine: shared clock + scheduled audio sink.
///
/// Implementors may be stateful (device handles, timelines). All calls come
/// from the single-threaded session event context.
pub trait AudioOutput: Send + 'static {
    /// Current time in seconds on this engine's clock. Starts at zero when
    /// the engine opens and advances monotonically whether or not audio is
    /// queued.
    fn now(&self) -> f64;

    /// Schedule `samples` (mono f32 at the transport rate) to begin playing
    /// at clock time `start` seconds. Items must be enqueued in
    /// non-decreasing `start` order — the cursor guarantees that.
    ///
    /// # Errors
    /// Engine failures are reported so the caller can log and skip the item;
    /// the engine itself stays usable.
    fn enqueue_at(&mut self, start: f64, samples: Vec<f32>) -> Result<()>;

    /// Tear the engine down, discarding anything not yet played.
    fn close(&mut self);
}

/// Creates playback engines on demand.
///
/// The factory is the collaborator boundary to the platform audio stack; the
/// default implementation is [`device::CpalOutputFactory`]. Tests substitute
/// a scripted fake.
pub trait OutputFactory: Send + Sync + 'static {
    /// Open a fresh engine with its clock at zero.
    ///
    /// # Errors
    /// Returns an error when no suitable output device exists.
    fn open(&self, sample_rate: u32) -> Result<Box<dyn AudioOutput>>;
}

/// Playback-side counters, mirrored by `CaptureDiagnostics` on the other
/// pipeline.
#[derive(Debug, Default)]
pub struct PlaybackDiagnostics {
    pub packets_decoded: AtomicUsize,
    pub packets_dropped: AtomicUsize,
    pub items_scheduled: AtomicUsize,
    pub underruns: AtomicUsize,
    pub interrupts: AtomicUsize,
    pub engine_errors: AtomicUsize,
}

impl PlaybackDiagnostics {
    pub fn reset(&self) {
        self.packets_decoded.store(0, Ordering::Relaxed);
        self.packets_dropped.store(0, Ordering::Relaxed);
        self.items_scheduled.store(0, Ordering::Relaxed);
        self.underruns.store(0, Ordering::Relaxed);
        self.interrupts.store(0, Ordering::Relaxed);
        self.engine_errors.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            packets_decoded: self.packets_decoded.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            items_scheduled: self.items_scheduled.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            interrupts: self.interrupts.load(Ordering::Relaxed),
            engine_errors: self.engine_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlaybackSnapshot {
    pub packets_decoded: usize,
    pub packets_dropped: usize,
    pub items_scheduled: usize,
    pub underruns: usize,
    pub interrupts: usize,
    pub engine_errors: usize,
}
