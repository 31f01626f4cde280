//! Raw frame layout.
//!
//! A frame is `width * height` samples in row-major order. Each sample is a
//! 16-bit little-endian word holding the 10-bit sensor value shifted left by
//! [`SAMPLE_SHIFT`].

use crate::channel::CaptureChannel;
use crate::error::FrameError;

/// Left shift applied to a sensor sample before it is stored.
pub const SAMPLE_SHIFT: u32 = 6;
/// Width of a sensor sample in bits.
pub const SAMPLE_BITS: u32 = 10;
/// Largest sensor sample value.
pub const MAX_SAMPLE: u16 = (1 << SAMPLE_BITS) - 1;
/// Bytes per stored sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Recover the 10-bit sample from a stored word.
#[inline]
#[must_use]
pub const fn decode_sample(word: u16) -> u16 {
    word >> SAMPLE_SHIFT
}

/// Store a sample the way the capture DMA does. Bits above
/// [`SAMPLE_BITS`] are discarded.
#[inline]
#[must_use]
pub const fn encode_sample(sample: u16) -> u16 {
    (sample & MAX_SAMPLE) << SAMPLE_SHIFT
}

/// Byte length of a frame with the given geometry, or `None` when it does
/// not fit in `usize`.
#[must_use]
pub fn frame_len(width: u32, height: u32) -> Option<usize> {
    usize::try_from(width)
        .ok()?
        .checked_mul(usize::try_from(height).ok()?)?
        .checked_mul(BYTES_PER_SAMPLE)
}

/// One frame read back from a capture channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    channel: CaptureChannel,
    index: u32,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a raw buffer after checking it matches the geometry.
    pub fn from_bytes(
        channel: CaptureChannel,
        index: u32,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyGeometry { width, height });
        }
        let expected = frame_len(width, height).ok_or(FrameError::TooLarge { width, height })?;
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            channel,
            index,
            width,
            height,
            data,
        })
    }

    /// Channel the frame was read from.
    #[must_use]
    pub fn channel(&self) -> CaptureChannel {
        self.channel
    }

    /// Index of the frame within its recording.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Width in samples.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in samples.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw little-endian words.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Give the raw buffer back.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Stored word at `(x, y)`, or `None` outside the frame.
    #[must_use]
    pub fn word(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_SAMPLE;
        Some(u16::from_le_bytes([self.data[offset], self.data[offset + 1]]))
    }

    /// Decoded sample at `(x, y)`.
    #[must_use]
    pub fn sample(&self, x: u32, y: u32) -> Option<u16> {
        self.word(x, y).map(decode_sample)
    }

    /// Decoded samples in row-major order.
    pub fn samples(&self) -> impl Iterator<Item = u16> + '_ {
        self.data
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| decode_sample(u16::from_le_bytes([pair[0], pair[1]])))
    }

    /// Decoded samples of one row.
    pub fn row(&self, y: u32) -> impl Iterator<Item = u16> + '_ {
        let row_bytes = self.width as usize * BYTES_PER_SAMPLE;
        let start = if y < self.height {
            y as usize * row_bytes
        } else {
            self.data.len()
        };
        let end = (start + row_bytes).min(self.data.len());
        self.data[start..end]
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| decode_sample(u16::from_le_bytes([pair[0], pair[1]])))
    }

    /// All decoded samples collected.
    #[must_use]
    pub fn to_samples(&self) -> Vec<u16> {
        self.samples().collect()
    }

    /// Mean decoded sample value.
    #[must_use]
    pub fn mean(&self) -> f64 {
        let (sum, count) = self
            .samples()
            .fold((0u64, 0u64), |(sum, count), s| (sum + u64::from(s), count + 1));
        if count == 0 {
            0.0
        } else {
            sum as f64 / count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_from_samples(width: u32, height: u32, samples: &[u16]) -> Frame {
        let data = samples
            .iter()
            .flat_map(|s| encode_sample(*s).to_le_bytes())
            .collect();
        Frame::from_bytes(CaptureChannel::Image, 0, width, height, data).unwrap()
    }

    #[test]
    fn test_bit_layout_law() {
        for sample in 0..=MAX_SAMPLE {
            let word = encode_sample(sample);
            assert_eq!(decode_sample(word), sample, "sample {sample}");
            let bytes = word.to_le_bytes();
            assert_eq!(decode_sample(u16::from_le_bytes(bytes)), sample);
        }
    }

    #[test]
    fn test_low_bits_are_discarded() {
        assert_eq!(decode_sample(0x003F), 0);
        assert_eq!(decode_sample(0xFFFF), MAX_SAMPLE);
    }

    #[test]
    fn test_length_is_checked() {
        let err = Frame::from_bytes(CaptureChannel::Black, 3, 4, 2, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            FrameError::LengthMismatch {
                width: 4,
                height: 2,
                expected: 16,
                actual: 15
            }
        );
        assert!(matches!(
            Frame::from_bytes(CaptureChannel::Black, 0, 0, 2, Vec::new()),
            Err(FrameError::EmptyGeometry { .. })
        ));
    }

    #[test]
    fn test_oversized_geometry_is_an_error() {
        assert_eq!(frame_len(u32::MAX, u32::MAX), None);
        assert_eq!(frame_len(640, 480), Some(640 * 480 * 2));
        assert_eq!(
            Frame::from_bytes(CaptureChannel::Image, 0, u32::MAX, u32::MAX, Vec::new()),
            Err(FrameError::TooLarge {
                width: u32::MAX,
                height: u32::MAX
            })
        );
    }

    #[test]
    fn test_row_major_access() {
        let frame = frame_from_samples(3, 2, &[1, 2, 3, 10, 20, 1023]);
        assert_eq!(frame.sample(0, 0), Some(1));
        assert_eq!(frame.sample(2, 0), Some(3));
        assert_eq!(frame.sample(0, 1), Some(10));
        assert_eq!(frame.sample(2, 1), Some(1023));
        assert_eq!(frame.sample(3, 0), None);
        assert_eq!(frame.row(1).collect::<Vec<_>>(), vec![10, 20, 1023]);
        assert_eq!(frame.row(2).count(), 0);
    }

    #[test]
    fn test_mean() {
        let frame = frame_from_samples(2, 2, &[0, 100, 200, 300]);
        assert!((frame.mean() - 150.0).abs() < f64::EPSILON);
    }
}
