//! Frame content for the simulated sensor.
//!
//! Samples are 10-bit values. The first two samples of row 0 carry the frame
//! index (low and high 10 bits), so frames of one recording never compare
//! equal.

use p3s7_core::frame::{encode_sample, BYTES_PER_SAMPLE, MAX_SAMPLE};

/// Mean level of dark (black-reference) frames.
pub const DARK_LEVEL: u16 = 32;

/// Noise amplitude of dark frames, exclusive.
pub const DARK_NOISE: u16 = 8;

/// LCG with glibc constants, for noise that is stable across platforms.
#[inline]
fn prng(seed: u64) -> u64 {
    seed.wrapping_mul(1103515245).wrapping_add(12345) & 0x7fffffff
}

fn stamp_index(samples: &mut [u16], index: u32) {
    let mask = u32::from(MAX_SAMPLE);
    if let Some(first) = samples.first_mut() {
        *first = (index & mask) as u16;
    }
    if let Some(second) = samples.get_mut(1) {
        *second = ((index >> 10) & mask) as u16;
    }
}

/// Generates an illuminated test frame.
///
/// Layers, bottom to top:
/// - diagonal gradient spanning the full 10-bit range
/// - checkerboard modulation for alignment checks
/// - a vertical bar that advances 8 columns per frame
/// - per-pixel noise seeded by `seed` and `index`
/// - the frame index stamp
pub fn generate_test_pattern(width: u32, height: u32, index: u32, seed: u64) -> Vec<u16> {
    let w = width as usize;
    let h = height as usize;
    let mut samples = vec![0u16; w * h];
    if samples.is_empty() {
        return samples;
    }

    let span = (w + h).max(2) - 1;
    let checker = (width.min(height) / 16).max(1) as usize;
    let bar_width = (w / 32).max(1);
    let bar_x = (index as usize).wrapping_mul(8) % w;
    let frame_seed = seed ^ u64::from(index).wrapping_mul(2654435761);

    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;

            let gradient = ((x + y) * usize::from(MAX_SAMPLE) / span) as i32;
            let modulation = if ((x / checker) + (y / checker)) % 2 == 0 { 0 } else { 48 };
            let noise = (prng(frame_seed ^ idx as u64) & 0xF) as i32 - 8;

            let mut value = (gradient * 3 / 4 + modulation + noise).clamp(0, i32::from(MAX_SAMPLE));
            if x >= bar_x && x < bar_x + bar_width {
                value = i32::from(MAX_SAMPLE);
            }
            samples[idx] = value as u16;
        }
    }

    stamp_index(&mut samples, index);
    samples
}

/// Generates a black-reference frame: [`DARK_LEVEL`] plus small noise.
pub fn generate_dark_frame(width: u32, height: u32, index: u32, seed: u64) -> Vec<u16> {
    let len = width as usize * height as usize;
    let frame_seed = seed ^ u64::from(index).wrapping_mul(40503);
    let mut samples: Vec<u16> = (0..len)
        .map(|idx| DARK_LEVEL + (prng(frame_seed ^ idx as u64) % u64::from(DARK_NOISE)) as u16)
        .collect();
    stamp_index(&mut samples, index);
    samples
}

/// Packs 10-bit samples into the little-endian 16-bit words the DMA writes.
pub fn encode_frame(samples: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for &sample in samples {
        bytes.extend_from_slice(&encode_sample(sample).to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use p3s7_core::frame::decode_sample;

    #[test]
    fn test_pattern_dimensions() {
        let samples = generate_test_pattern(640, 320, 0, 1);
        assert_eq!(samples.len(), 640 * 320);
        assert!(samples.iter().all(|&s| s <= MAX_SAMPLE));
    }

    #[test]
    fn test_pattern_is_deterministic() {
        assert_eq!(
            generate_test_pattern(64, 48, 5, 99),
            generate_test_pattern(64, 48, 5, 99)
        );
    }

    #[test]
    fn test_frames_are_distinct() {
        let a = generate_test_pattern(16, 16, 0, 7);
        let b = generate_test_pattern(16, 16, 1, 7);
        assert_ne!(a, b);
        assert_eq!(a[0], 0);
        assert_eq!(b[0], 1);
    }

    #[test]
    fn test_index_stamp_high_bits() {
        let samples = generate_dark_frame(4, 1, 1025, 0);
        assert_eq!(samples[0], 1);
        assert_eq!(samples[1], 1);
    }

    #[test]
    fn test_dark_frame_is_dark() {
        let samples = generate_dark_frame(64, 64, 3, 11);
        assert!(samples[2..]
            .iter()
            .all(|&s| (DARK_LEVEL..DARK_LEVEL + DARK_NOISE).contains(&s)));
    }

    #[test]
    fn test_empty_geometry() {
        assert!(generate_test_pattern(0, 10, 0, 0).is_empty());
        assert!(generate_dark_frame(10, 0, 0, 0).is_empty());
    }

    #[test]
    fn test_encode_frame_layout() {
        let bytes = encode_frame(&[0x3FF, 0x001]);
        assert_eq!(bytes, vec![0xC0, 0xFF, 0x40, 0x00]);
        let word = u16::from_le_bytes([bytes[0], bytes[1]]);
        assert_eq!(decode_sample(word), 0x3FF);
    }
}
