//! Float sample to PCM byte conversion.

/// Writes `samples` into `out` as 16-bit little-endian PCM.
///
/// `[-1, 0)` maps onto `[-32768, 0)` and `[0, 1]` onto `[0, 32767]`; the signed
/// value is reinterpreted as `u16`, so negative samples land in the upper half
/// of the unsigned range. `out` must hold `2 * samples.len()` bytes. Returns the
/// number of bytes written.
pub fn write_unsigned_pcm16(samples: &[f32], out: &mut [u8]) -> usize {
    for (sample, bytes) in samples.iter().zip(out.chunks_exact_mut(2)) {
        bytes.copy_from_slice(&sample_to_u16(*sample).to_le_bytes());
    }

    samples.len().min(out.len() / 2) * 2
}

/// Allocating form of [`write_unsigned_pcm16`].
pub fn f32_to_unsigned_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = vec![0u8; samples.len() * 2];
    write_unsigned_pcm16(samples, &mut out);
    out
}

fn sample_to_u16(x: f32) -> u16 {
    let scaled = if x < 0.0 {
        (x * 32768.0).round()
    } else {
        (x * 32767.0).round()
    };

    // Float-to-int `as` saturates, so out-of-range input pins to the rails
    scaled as i16 as u16
}
