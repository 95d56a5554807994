//! Chunk ⇄ packet codec.
//!
//! A packet is the base64 text of a chunk's raw PCM bytes (i16 little-endian,
//! mono). Encoding is pure and lossless; one chunk maps to exactly one
//! packet and byte order is preserved.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::buffering::chunk::PcmChunk;
use crate::error::{ColloquyError, Result};

/// Serialize a chunk's samples to a transport-safe base64 string.
///
/// Always succeeds over well-formed input; a chunk whose byte length is not a
/// multiple of the sample size cannot be constructed from `Vec<i16>`, which
/// is the invariant this signature encodes.
pub fn encode_chunk(chunk: &PcmChunk) -> String {
    let mut bytes = Vec::with_capacity(chunk.samples.len() * 2);
    for sample in &chunk.samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    BASE64.encode(&bytes)
}

/// Decode a packet back to raw i16 samples.
///
/// # Errors
/// - `MalformedPacket` for invalid base64 or an odd byte count.
/// - `EmptyPacket` when the packet decodes to zero samples — such a packet
///   must never reach the scheduler (it would produce a zero-length item and
///   a scheduling gap), so it is rejected here.
pub fn decode_packet(packet: &str) -> Result<Vec<i16>> {
    let bytes = BASE64
        .decode(packet)
        .map_err(|e| ColloquyError::MalformedPacket(format!("base64: {e}")))?;

    if bytes.len() % 2 != 0 {
        return Err(ColloquyError::MalformedPacket(format!(
            "{} bytes is not a whole number of i16 samples",
            bytes.len()
        )));
    }
    if bytes.is_empty() {
        return Err(ColloquyError::EmptyPacket);
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Widen i16 samples to normalized f32 in [-1.0, 1.0).
pub fn widen_samples(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| f32::from(s) / 32_768.0).collect()
}

/// Quantize f32 samples in [-1.0, 1.0] to i16 (capture direction).
pub fn quantize_samples(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s * 32_767.0).clamp(-32_768.0, 32_767.0) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn decode_inverts_encode() {
        let samples: Vec<i16> = (-1_200..1_200).map(|i| (i * 27) as i16).collect();
        let chunk = PcmChunk::new(samples.clone(), 24_000);
        let packet = encode_chunk(&chunk);
        assert_eq!(decode_packet(&packet).unwrap(), samples);
    }

    #[test]
    fn extreme_sample_values_survive_the_round_trip() {
        let samples = vec![i16::MIN, -1, 0, 1, i16::MAX];
        let chunk = PcmChunk::new(samples.clone(), 24_000);
        assert_eq!(decode_packet(&encode_chunk(&chunk)).unwrap(), samples);
    }

    #[test]
    fn invalid_base64_is_malformed() {
        let err = decode_packet("not!!base64??").unwrap_err();
        assert!(err.is_packet_local());
    }

    #[test]
    fn odd_byte_count_is_malformed() {
        let packet = BASE64.encode([0u8, 1, 2]); // 3 bytes — not whole samples
        let err = decode_packet(&packet).unwrap_err();
        assert!(matches!(err, ColloquyError::MalformedPacket(_)));
    }

    #[test]
    fn empty_packet_is_rejected() {
        let err = decode_packet("").unwrap_err();
        assert!(matches!(err, ColloquyError::EmptyPacket));
    }

    #[test]
    fn widened_samples_stay_in_unit_range() {
        let widened = widen_samples(&[i16::MIN, 0, i16::MAX]);
        assert_abs_diff_eq!(widened[0], -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(widened[1], 0.0, epsilon = 1e-6);
        assert!(widened[2] < 1.0, "max i16 must widen below 1.0");
    }

    #[test]
    fn quantize_clamps_out_of_range_input() {
        let narrowed = quantize_samples(&[-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(narrowed[0], -32_768);
        assert_eq!(narrowed[2], 0);
        assert_eq!(narrowed[4], 32_767);
    }
}
