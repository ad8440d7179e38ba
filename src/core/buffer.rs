//! Single-channel intensity buffers.
//!
//! [`ImageBuffer`] owns a row-major grid of `u8` samples. Buffers move
//! between pipeline stages by value; no stage holds a shared mutable
//! reference to another stage's buffer.

use crate::core::error::{SobelError, SobelResult};
use serde::{Deserialize, Serialize};

/// Width and height of an image, as broadcast to every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
}

impl Dimensions {
    /// Create a new dimension pair.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of samples, or an allocation failure if it overflows `usize`.
    pub fn sample_count(&self) -> SobelResult<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .ok_or(SobelError::AllocationFailure { bytes: usize::MAX })
    }
}

/// Allocate a zeroed sample vector, reporting failure instead of aborting.
pub(crate) fn try_alloc_zeroed(len: usize) -> SobelResult<Vec<u8>> {
    let mut samples = Vec::new();
    samples
        .try_reserve_exact(len)
        .map_err(|_| SobelError::AllocationFailure { bytes: len })?;
    samples.resize(len, 0);
    Ok(samples)
}

/// A 2-D grid of single-channel intensity samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    samples: Vec<u8>,
}

impl ImageBuffer {
    /// Create a zero-filled buffer.
    pub fn try_zeroed(width: u32, height: u32) -> SobelResult<Self> {
        let len = Dimensions::new(width, height).sample_count()?;
        Ok(Self {
            width,
            height,
            samples: try_alloc_zeroed(len)?,
        })
    }

    /// Wrap existing samples. The length must equal `width * height`.
    pub fn from_samples(width: u32, height: u32, samples: Vec<u8>) -> SobelResult<Self> {
        let expected = Dimensions::new(width, height).sample_count()?;
        if samples.len() != expected {
            return Err(SobelError::ShapeMismatch {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Build a buffer by evaluating `f(x, y)` for every pixel.
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> SobelResult<Self>
    where
        F: FnMut(u32, u32) -> u8,
    {
        let mut buffer = Self::try_zeroed(width, height)?;
        for y in 0..height {
            for x in 0..width {
                buffer.samples[y as usize * width as usize + x as usize] = f(x, y);
            }
        }
        Ok(buffer)
    }

    /// Number of columns.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width and height together.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Sample at column `x`, row `y`.
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Borrow row `y`.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.width as usize;
        &self.samples[start..start + self.width as usize]
    }

    /// Borrow the contiguous rows `[start, start + count)`.
    pub fn rows(&self, start: u32, count: u32) -> &[u8] {
        let width = self.width as usize;
        let begin = start as usize * width;
        &self.samples[begin..begin + count as usize * width]
    }

    /// Mutably borrow the contiguous rows `[start, start + count)`.
    pub fn rows_mut(&mut self, start: u32, count: u32) -> &mut [u8] {
        let width = self.width as usize;
        let begin = start as usize * width;
        &mut self.samples[begin..begin + count as usize * width]
    }

    /// All samples in row-major order.
    pub fn as_raw(&self) -> &[u8] {
        &self.samples
    }

    /// Consume the buffer, returning the samples.
    pub fn into_raw(self) -> Vec<u8> {
        self.samples
    }
}
