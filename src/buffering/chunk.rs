//! Typed PCM chunk passed from the frame accumulator to the wire encoder.

/// A contiguous block of mono 16-bit PCM samples at a known sample rate.
///
/// One `PcmChunk` becomes exactly one outbound packet. Allocated once per
/// flush on the non-RT pipeline thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmChunk {
    /// Mono i16 samples.
    pub samples: Vec<i16>,
    /// Sample rate in Hz (24 000 for the transport format).
    pub sample_rate: u32,
}

impl PcmChunk {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Returns the duration of this chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Returns true if the chunk contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
