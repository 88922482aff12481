//! PCM sample conversion and level metering.

/// Root-mean-square level of samples in `[-1.0, 1.0]`.
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Encode f32 samples as little-endian signed PCM of `bit_depth` bits.
///
/// Out-of-range samples are clamped. Unsupported depths fall back to 16-bit.
pub fn encode_pcm(samples: &[f32], bit_depth: u16) -> Vec<u8> {
    let width = match bit_depth {
        24 => 3,
        32 => 4,
        _ => 2,
    };
    let mut data = Vec::with_capacity(samples.len() * width);
    for &sample in samples {
        let clamped = f64::from(sample.clamp(-1.0, 1.0));
        match width {
            3 => {
                let value = (clamped * 8_388_607.0) as i32;
                data.extend_from_slice(&value.to_le_bytes()[..3]);
            }
            4 => data.extend_from_slice(&((clamped * f64::from(i32::MAX)) as i32).to_le_bytes()),
            _ => data.extend_from_slice(&((clamped * f64::from(i16::MAX)) as i16).to_le_bytes()),
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms_level(&[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(rms_level(&[]), 0.0);
    }

    #[test]
    fn rms_of_full_scale_square_is_one() {
        assert_relative_eq!(rms_level(&[1.0, -1.0, 1.0, -1.0]), 1.0);
    }

    #[test]
    fn rms_of_sine_is_inverse_sqrt_two() {
        let sine: Vec<f32> = (0..4800)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 48000.0).sin())
            .collect();
        assert_relative_eq!(rms_level(&sine), std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-3);
    }

    #[test]
    fn pcm16_full_scale_and_clamping() {
        let pcm = encode_pcm(&[0.0, 1.0, -1.0, 2.0], 16);
        assert_eq!(pcm.len(), 8);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([pcm[4], pcm[5]]), -i16::MAX);
        assert_eq!(i16::from_le_bytes([pcm[6], pcm[7]]), i16::MAX);
    }

    #[test]
    fn pcm_widths_follow_bit_depth() {
        assert_eq!(encode_pcm(&[0.5; 10], 24).len(), 30);
        assert_eq!(encode_pcm(&[0.5; 10], 32).len(), 40);
    }
}
