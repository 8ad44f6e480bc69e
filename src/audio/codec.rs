//! PCM16 frame codec
//!
//! Converts between little-endian 16-bit PCM byte buffers and
//! normalized f32 sample vectors. Pure and stateless.

use crate::{Error, Result};

/// Sample rate for capture and playback unless otherwise negotiated
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Decode little-endian PCM16 bytes to normalized f32 samples.
///
/// # Errors
///
/// Returns `Error::Audio` if the buffer length is odd.
pub fn pcm16_to_samples(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 2 != 0 {
        return Err(Error::Audio(format!(
            "PCM16 buffer length {} is not a multiple of 2",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|c| f32::from(i16::from_le_bytes([c[0], c[1]])) / 32768.0)
        .collect())
}

/// Encode normalized f32 samples as little-endian PCM16 bytes.
///
/// Samples are clamped to [-1.0, 1.0] before scaling.
#[must_use]
pub fn samples_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let clamped = s.clamp(-1.0, 1.0);
        #[allow(clippy::cast_possible_truncation)]
        let value = (clamped * 32767.0) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Duration in seconds of `sample_count` mono samples at `sample_rate`
#[must_use]
pub fn duration_secs(sample_count: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    {
        sample_count as f64 / f64::from(sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_odd_length() {
        assert!(pcm16_to_samples(&[0x00, 0x01, 0x02]).is_err());
    }

    #[test]
    fn decode_known_values() {
        // 0, i16::MAX, i16::MIN
        let bytes = [0x00, 0x00, 0xFF, 0x7F, 0x00, 0x80];
        let samples = pcm16_to_samples(&bytes).unwrap();
        assert_eq!(samples.len(), 3);
        assert!((samples[0]).abs() < f32::EPSILON);
        assert!((samples[1] - 32767.0 / 32768.0).abs() < 1e-6);
        assert!((samples[2] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn encode_clamps_out_of_range() {
        let bytes = samples_to_pcm16(&[2.0, -2.0]);
        assert_eq!(bytes, [0xFF, 0x7F, 0x01, 0x80]);
    }

    #[test]
    fn round_trip_preserves_sign_and_scale() {
        let original = vec![0.0, 0.5, -0.5, 0.25];
        let decoded = pcm16_to_samples(&samples_to_pcm16(&original)).unwrap();
        for (a, b) in original.iter().zip(decoded.iter()) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn duration_of_one_second_of_audio() {
        let secs = duration_secs(24_000, OUTPUT_SAMPLE_RATE);
        assert!((secs - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn duration_with_zero_rate_is_zero() {
        assert!(duration_secs(100, 0).abs() < f64::EPSILON);
    }
}
