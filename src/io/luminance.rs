//! RGB to intensity conversion.

use crate::core::buffer::{try_alloc_zeroed, Dimensions, ImageBuffer};
use crate::core::error::{SobelError, SobelResult};
use rayon::prelude::*;

/// Weighted luminance of one pixel, truncated toward zero.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    (0.21 * r as f64 + 0.72 * g as f64 + 0.07 * b as f64) as u8
}

/// Convert interleaved RGB samples to a single-channel buffer.
///
/// `rgb` must hold exactly `width * height * 3` bytes.
pub fn rgb_to_gray(width: u32, height: u32, rgb: &[u8]) -> SobelResult<ImageBuffer> {
    let pixels = Dimensions::new(width, height).sample_count()?;
    let expected = pixels
        .checked_mul(3)
        .ok_or(SobelError::AllocationFailure { bytes: usize::MAX })?;
    if rgb.len() != expected {
        return Err(SobelError::ShapeMismatch {
            expected,
            actual: rgb.len(),
        });
    }

    let mut gray = try_alloc_zeroed(pixels)?;
    gray.par_iter_mut()
        .zip(rgb.par_chunks_exact(3))
        .for_each(|(out, px)| *out = luminance(px[0], px[1], px[2]));

    ImageBuffer::from_samples(width, height, gray)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminance_weights() {
        assert_eq!(luminance(0, 0, 0), 0);
        assert_eq!(luminance(100, 0, 0), 21);
        assert_eq!(luminance(0, 100, 0), 72);
        assert_eq!(luminance(0, 0, 100), 7);
        assert_eq!(luminance(200, 50, 10), 78);
        // The weighted sum lands just below the integer and truncates.
        assert_eq!(luminance(10, 10, 10), 9);
        assert_eq!(luminance(255, 255, 255), 254);
    }

    #[test]
    fn test_rgb_to_gray() {
        let rgb = [100, 0, 0, 0, 100, 0, 0, 0, 100, 10, 10, 10];
        let gray = rgb_to_gray(2, 2, &rgb).unwrap();
        assert_eq!(gray.as_raw(), &[21, 72, 7, 9]);
    }

    #[test]
    fn test_rgb_length_mismatch() {
        let result = rgb_to_gray(2, 2, &[0; 11]);
        assert!(matches!(
            result,
            Err(SobelError::ShapeMismatch { expected: 12, actual: 11 })
        ));
    }
}
