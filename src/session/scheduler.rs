//! Gapless playback scheduling.
//!
//! The cursor tracks `next_start` — the clock time at which the next item
//! should begin. The decision is pure so the core guarantee (gapless,
//! non-overlapping, order-preserving, self-healing after underrun) is
//! testable without an audio device.

/// The shared playback cursor, owned by the session controller.
///
/// Times are seconds on the current engine's clock. The cursor is only
/// meaningful relative to one engine instance: both reset together on
/// interruption, so a fresh engine always pairs with a zeroed cursor.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackCursor {
    next_start: f64,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        Self { next_start: 0.0 }
    }

    /// Decide when an item of `duration` seconds starts, given the clock
    /// reads `now`.
    ///
    /// - `now < next_start`: the queue is ahead — the item begins exactly at
    ///   `next_start`, abutting its predecessor with zero gap.
    /// - `now >= next_start`: the queue ran dry (underrun) — the item begins
    ///   immediately at `now`, resynchronizing the cursor to the present
    ///   rather than scheduling into the past.
    ///
    /// Either way the cursor advances by `duration`.
    pub fn schedule(&mut self, now: f64, duration: f64) -> f64 {
        let start = if now < self.next_start {
            self.next_start
        } else {
            now
        };
        self.next_start = start + duration;
        start
    }

    /// Forget the schedule entirely (interruption / teardown).
    pub fn reset(&mut self) {
        self.next_start = 0.0;
    }

    /// Clock time at which the next item would begin if it arrived in time.
    pub fn next_start(&self) -> f64 {
        self.next_start
    }
}

impl Default for PlaybackCursor {
    fn default() -> Self {
        Self::new()
    }
}
