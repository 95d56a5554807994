//! Sample-rate conversion from the capture device to the transport rate.
//!
//! cpal captures at the device's native rate (commonly 44.1/48 kHz); the wire
//! carries mono PCM at a fixed 24 kHz. `RateConverter` always targets that
//! transport rate and runs on the non-RT pipeline thread, where allocation is
//! allowed. A device already at 24 kHz gets a passthrough — no rubato
//! session is created at all.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::{error, info};

use crate::error::{ColloquyError, Result};
use crate::wire;

/// Converts f32 mono audio from the device rate to the 24 kHz transport rate.
pub struct RateConverter {
    /// `None` when the device already runs at the transport rate.
    inner: Option<FastFixedIn<f32>>,
    /// Trailing partial block carried over between calls — rubato consumes
    /// fixed-size blocks only.
    pending: Vec<f32>,
    /// Input samples consumed per conversion step.
    block: usize,
    /// Pre-allocated rubato output: `[1][output_frames_max]`.
    scratch: Vec<Vec<f32>>,
}

impl RateConverter {
    /// Build a converter from `source_rate` to the transport rate, consuming
    /// `block` input samples per conversion step.
    ///
    /// # Errors
    /// `ColloquyError::AudioDevice` if rubato rejects the configuration.
    pub fn to_transport(source_rate: u32, block: usize) -> Result<Self> {
        if source_rate == wire::SAMPLE_RATE {
            return Ok(Self {
                inner: None,
                pending: Vec::new(),
                block,
                scratch: Vec::new(),
            });
        }

        let ratio = f64::from(wire::SAMPLE_RATE) / f64::from(source_rate);
        let inner = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio — no dynamic adjustment
            PolynomialDegree::Cubic,
            block,
            1, // mono
        )
        .map_err(|e| ColloquyError::AudioDevice(format!("resampler init: {e}")))?;

        let scratch = vec![vec![0f32; inner.output_frames_max()]];
        info!(source_rate, target_rate = wire::SAMPLE_RATE, block, "resampling enabled");

        Ok(Self {
            inner: Some(inner),
            pending: Vec::new(),
            block,
            scratch,
        })
    }

    /// Convert `input`, returning transport-rate samples (possibly empty).
    ///
    /// Every whole block available converts immediately; a trailing partial
    /// block waits for the next call, so no sample is lost at block
    /// boundaries. Passthrough mode returns the input unchanged.
    pub fn convert(&mut self, input: &[f32]) -> Vec<f32> {
        let Some(inner) = self.inner.as_mut() else {
            return input.to_vec();
        };

        self.pending.extend_from_slice(input);
        let whole = self.pending.len() - self.pending.len() % self.block;

        let mut out = Vec::new();
        for block in self.pending[..whole].chunks_exact(self.block) {
            match inner.process_into_buffer(&[block], &mut self.scratch, None) {
                Ok((_, produced)) => out.extend_from_slice(&self.scratch[0][..produced]),
                Err(e) => error!("resampler process error: {e}"),
            }
        }
        self.pending.drain(..whole);
        out
    }

    /// `true` when the device rate equals the transport rate.
    pub fn is_passthrough(&self) -> bool {
        self.inner.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_at_transport_rate_is_passthrough() {
        let mut rc = RateConverter::to_transport(24_000, 480).unwrap();
        assert!(rc.is_passthrough());
        let samples: Vec<f32> = (0..480).map(|i| i as f32 * 0.001).collect();
        assert_eq!(rc.convert(&samples), samples);
    }

    #[test]
    fn converting_48k_halves_the_sample_count() {
        let mut rc = RateConverter::to_transport(48_000, 480).unwrap();
        assert!(!rc.is_passthrough());
        let out = rc.convert(&vec![0.0f32; 480]);
        assert!(
            (out.len() as isize - 240).unsigned_abs() <= 8,
            "output len={} expected≈240",
            out.len()
        );
    }

    #[test]
    fn trailing_partial_block_is_carried_over() {
        let mut rc = RateConverter::to_transport(48_000, 480).unwrap();
        assert!(rc.convert(&vec![0.0f32; 250]).is_empty());
        assert!(
            !rc.convert(&vec![0.0f32; 250]).is_empty(),
            "second call should complete the block"
        );
    }

    #[test]
    fn oversized_input_converts_every_whole_block() {
        let mut rc = RateConverter::to_transport(48_000, 480).unwrap();
        // Three whole blocks plus a 100-sample tail.
        let out = rc.convert(&vec![0.0f32; 480 * 3 + 100]);
        assert!(
            (out.len() as isize - 720).unsigned_abs() <= 24,
            "output len={} expected≈720",
            out.len()
        );
        // The tail converts once the next call completes its block.
        assert!(!rc.convert(&vec![0.0f32; 380]).is_empty());
    }

    #[test]
    fn upsamples_44_1k_to_transport_rate() {
        let mut rc = RateConverter::to_transport(44_100, 441).unwrap();
        let out = rc.convert(&vec![0.1f32; 882]);
        assert!(!out.is_empty());
    }
}
