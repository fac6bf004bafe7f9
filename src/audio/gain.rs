//! Linear volume scaling for 16-bit PCM.

/// Lowest accepted gain value.
pub const MIN_GAIN: f32 = 0.0;
/// Highest accepted gain value.
pub const MAX_GAIN: f32 = 2.0;

/// Scale every sample by `gain`, saturating at the 16-bit signed range.
///
/// Pure and deterministic; the input is never modified.
pub fn adjust_volume(samples: &[i16], gain: f32) -> Vec<i16> {
    samples.iter().map(|&s| scale_sample(s, gain)).collect()
}

/// Clamp a requested gain into `[0.0, 2.0]`.
pub fn clamp_gain(gain: f32) -> f32 {
    gain.clamp(MIN_GAIN, MAX_GAIN)
}

fn scale_sample(sample: i16, gain: f32) -> i16 {
    let scaled = sample as f32 * gain;
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_gain_is_identity() {
        let samples = vec![0, 1, -1, 1000, -1000, i16::MAX, i16::MIN];
        assert_eq!(adjust_volume(&samples, 1.0), samples);
    }

    #[test]
    fn zero_gain_silences() {
        let samples = vec![5, -5, i16::MAX, i16::MIN];
        assert_eq!(adjust_volume(&samples, 0.0), vec![0, 0, 0, 0]);
    }

    #[test]
    fn doubling_scales_linearly() {
        assert_eq!(adjust_volume(&[100, -200], 2.0), vec![200, -400]);
    }

    #[test]
    fn positive_overflow_saturates() {
        assert_eq!(adjust_volume(&[30_000], 2.0), vec![i16::MAX]);
        assert_eq!(adjust_volume(&[i16::MAX], 1.5), vec![i16::MAX]);
    }

    #[test]
    fn negative_overflow_saturates() {
        assert_eq!(adjust_volume(&[-30_000], 2.0), vec![i16::MIN]);
        assert_eq!(adjust_volume(&[i16::MIN], 2.0), vec![i16::MIN]);
    }

    /// For every gain in the accepted range, the output equals the clamped
    /// product — no wrapping, whatever the input sample.
    #[test]
    fn output_matches_clamped_product() {
        let extremes = [i16::MIN, -12_345, -1, 0, 1, 12_345, i16::MAX];
        for step in 0..=20 {
            let gain = step as f32 * 0.1; // 0.0 ..= 2.0
            let out = adjust_volume(&extremes, gain);
            for (&sample, &result) in extremes.iter().zip(&out) {
                let expected = (sample as f32 * gain)
                    .clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                assert_eq!(result, expected, "sample {sample} gain {gain}");
            }
        }
    }

    #[test]
    fn fractional_gain_truncates_toward_zero() {
        assert_eq!(adjust_volume(&[3], 0.5), vec![1]);
        assert_eq!(adjust_volume(&[-3], 0.5), vec![-1]);
    }

    #[test]
    fn clamp_gain_bounds() {
        assert_eq!(clamp_gain(-0.5), 0.0);
        assert_eq!(clamp_gain(0.0), 0.0);
        assert_eq!(clamp_gain(1.3), 1.3);
        assert_eq!(clamp_gain(2.0), 2.0);
        assert_eq!(clamp_gain(7.0), 2.0);
    }
}
