//! PCM sample format conversions.
//!
//! Float samples are nominally in [-1.0, 1.0]. Encoding to PCM16 clamps
//! first, then scales asymmetrically: negative values by 32768, non-negative
//! by 32767, rounding to nearest. This keeps -1.0 at exactly `i16::MIN` and
//! 1.0 at exactly `i16::MAX`.

/// Converts one signed 16-bit sample to float in [-1.0, 1.0).
#[inline]
#[must_use]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32_768.0
}

/// Converts one float sample to signed 16-bit PCM.
#[inline]
#[must_use]
pub fn f32_to_i16(sample: f32) -> i16 {
    let v = sample.clamp(-1.0, 1.0);
    if v < 0.0 {
        (v * 32_768.0).round() as i16
    } else {
        (v * 32_767.0).round() as i16
    }
}

/// Converts a slice of signed 16-bit samples to floats.
#[must_use]
pub fn i16_slice_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().copied().map(i16_to_f32).collect()
}

/// Converts a slice of float samples to signed 16-bit PCM.
#[must_use]
pub fn f32_slice_to_i16(samples: &[f32]) -> Vec<i16> {
    samples.iter().copied().map(f32_to_i16).collect()
}

/// Encodes signed 16-bit samples as little-endian bytes.
#[must_use]
pub fn i16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Decodes little-endian bytes into signed 16-bit samples.
///
/// A trailing odd byte is ignored.
#[must_use]
pub fn le_bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
