//! Saturating sample combination with 8.8 fixed-point volume

use crate::types::{Sample, UNITY_VOLUME};

#[inline]
fn saturate(value: i32) -> Sample {
    value.clamp(Sample::MIN as i32, Sample::MAX as i32) as Sample
}

#[inline]
fn scale(sample: Sample, volume: i32) -> i32 {
    sample as i32 * volume / UNITY_VOLUME
}

/// Combine `input` into `out`
///
/// Processes `min(out.len(), input.len())` samples. When `additive` is false
/// the input overwrites the output (a plain copy at unity volume); otherwise
/// the scaled input is added to what is already there. Results are clamped to
/// the 16-bit range, never wrapped.
pub fn mix(additive: bool, out: &mut [Sample], input: &[Sample], volume: i32) {
    let count = out.len().min(input.len());
    let (out, input) = (&mut out[..count], &input[..count]);

    if !additive {
        if volume == UNITY_VOLUME {
            out.copy_from_slice(input);
        } else {
            for (o, &i) in out.iter_mut().zip(input) {
                *o = saturate(scale(i, volume));
            }
        }
    } else if volume == UNITY_VOLUME {
        for (o, &i) in out.iter_mut().zip(input) {
            *o = saturate(*o as i32 + i as i32);
        }
    } else {
        for (o, &i) in out.iter_mut().zip(input) {
            *o = saturate(*o as i32 + scale(i, volume));
        }
    }
}

/// Scale samples in place
pub fn apply_volume(samples: &mut [Sample], volume: i32) {
    if volume == UNITY_VOLUME {
        return;
    }
    for s in samples.iter_mut() {
        *s = saturate(scale(*s, volume));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_copy_is_bit_identical() {
        let input: Vec<Sample> = (-50..50).map(|v| v * 300).collect();
        let mut out = vec![0x5555; input.len()];
        mix(false, &mut out, &input, UNITY_VOLUME);
        assert_eq!(out, input);
    }

    #[test]
    fn test_overwrite_scaled() {
        let mut out = [99; 3];
        mix(false, &mut out, &[1000, -1000, 3], 0x80);
        assert_eq!(out, [500, -500, 1]);
    }

    #[test]
    fn test_overwrite_boost_saturates() {
        let mut out = [0; 2];
        mix(false, &mut out, &[30000, -30000], 0x200);
        assert_eq!(out, [i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_additive_saturates_instead_of_wrapping() {
        let mut out = [32000, -32000, 100];
        mix(true, &mut out, &[32000, -32000, 23], UNITY_VOLUME);
        assert_eq!(out, [32767, -32768, 123]);

        let mut out = [i16::MAX, i16::MIN];
        mix(true, &mut out, &[i16::MAX, i16::MIN], UNITY_VOLUME);
        assert_eq!(out, [32767, -32768]);
    }

    #[test]
    fn test_additive_with_volume() {
        let mut out = [100, 100];
        mix(true, &mut out, &[512, -512], 0x80);
        assert_eq!(out, [356, -156]);
    }

    #[test]
    fn test_count_is_shorter_slice() {
        let mut out = [7; 4];
        mix(false, &mut out, &[1, 2], UNITY_VOLUME);
        assert_eq!(out, [1, 2, 7, 7]);
    }

    #[test]
    fn test_apply_volume() {
        let mut samples = [100, -100, 20000];
        apply_volume(&mut samples, 0x200);
        assert_eq!(samples, [200, -200, i16::MAX]);

        let mut unchanged = [1, 2];
        apply_volume(&mut unchanged, UNITY_VOLUME);
        assert_eq!(unchanged, [1, 2]);
    }
}
