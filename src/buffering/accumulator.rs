//! Frame accumulation — groups capture frames into time-boxed chunks.
//!
//! The accumulator is a small explicit state machine:
//!
//! ```text
//! Idle ──push──► Accumulating ──threshold/flush──► Idle
//! ```
//!
//! Frames are appended whole; a flush happens only at a frame boundary, so a
//! frame is never split across two chunks. Because of that, a chunk may run
//! slightly past the 100 ms target when the final frame crosses the
//! threshold.

use crate::buffering::chunk::PcmChunk;

/// Where the accumulator is in its fill cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    /// Buffer is empty; a flush here is a no-op.
    Idle,
    /// Buffer holds at least one frame awaiting the threshold.
    Accumulating,
}

/// Groups incoming PCM frames into chunks of roughly `target_samples`.
#[derive(Debug)]
pub struct FrameAccumulator {
    samples: Vec<i16>,
    target_samples: usize,
    sample_rate: u32,
}

impl FrameAccumulator {
    /// `target_samples` is the flush threshold — e.g. 2 400 samples for a
    /// 100 ms chunk at 24 kHz.
    pub fn new(target_samples: usize, sample_rate: u32) -> Self {
        Self {
            samples: Vec::with_capacity(target_samples * 2),
            target_samples,
            sample_rate,
        }
    }

    pub fn state(&self) -> AccumulatorState {
        if self.samples.is_empty() {
            AccumulatorState::Idle
        } else {
            AccumulatorState::Accumulating
        }
    }

    /// Number of samples currently buffered.
    pub fn buffered(&self) -> usize {
        self.samples.len()
    }

    /// Append one frame; returns a chunk when the threshold is reached.
    ///
    /// The returned chunk contains everything buffered so far (whole frames
    /// only), and the buffer is reset atomically with the flush.
    pub fn push(&mut self, frame: &[i16]) -> Option<PcmChunk> {
        if frame.is_empty() {
            return None;
        }
        self.samples.extend_from_slice(frame);
        if self.samples.len() >= self.target_samples {
            self.flush()
        } else {
            None
        }
    }

    /// Flush whatever is buffered, if anything.
    ///
    /// An empty buffer yields `None` — the first-flush edge case is a no-op,
    /// never an error, and no empty chunk is ever produced.
    pub fn flush(&mut self) -> Option<PcmChunk> {
        if self.samples.is_empty() {
            return None;
        }
        let samples = std::mem::take(&mut self.samples);
        Some(PcmChunk::new(samples, self.sample_rate))
    }
}
