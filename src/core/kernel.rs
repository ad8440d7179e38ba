//! The 3×3 Sobel gradient stencil.
//!
//! For every interior pixel of a partition the kernel correlates the 3×3
//! neighbourhood with the horizontal and vertical Sobel matrices and maps
//! the pair `(gx, gy)` to an output sample through a [`ThresholdPolicy`].
//!
//! Pixels on the first and last row and the first and last column of the
//! grid have no complete neighbourhood and are written as 0. A partition
//! seam looks exactly like an image edge from inside the partition, so
//! without halo rows every seam yields a zero stripe.
//!
//! Rows of the output are disjoint slices, so they are computed on a rayon
//! pool with no locking.

use crate::core::buffer::try_alloc_zeroed;
use crate::core::error::{SobelError, SobelResult};
use crate::core::partition::{Partition, RowBlock};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Default binary threshold on the gradient magnitude.
pub const DEFAULT_THRESHOLD: u32 = 100;

/// Default number of stencil threads per worker.
pub const DEFAULT_THREADS: usize = 4;

/// Value written to pixels the stencil does not compute.
pub const BOUNDARY_VALUE: u8 = 0;

/// A pair of fixed 3×3 gradient matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradientKernel {
    /// Horizontal derivative coefficients, indexed `[row][column]`.
    pub horizontal: [[i32; 3]; 3],
    /// Vertical derivative coefficients, indexed `[row][column]`.
    pub vertical: [[i32; 3]; 3],
}

/// The Sobel operator.
pub const SOBEL: GradientKernel = GradientKernel {
    horizontal: [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]],
    vertical: [[-1, -2, -1], [0, 0, 0], [1, 2, 1]],
};

impl GradientKernel {
    /// Gradient pair at column `x` of the middle row of `rows`.
    ///
    /// `x` must satisfy `1 <= x <= width - 2`.
    #[inline]
    pub fn respond(&self, rows: [&[u8]; 3], x: usize) -> (i32, i32) {
        let mut gx = 0;
        let mut gy = 0;
        for (j, row) in rows.iter().enumerate() {
            for i in 0..3 {
                let sample = i32::from(row[x + i - 1]);
                gx += sample * self.horizontal[j][i];
                gy += sample * self.vertical[j][i];
            }
        }
        (gx, gy)
    }
}

/// How a gradient pair becomes an output sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdPolicy {
    /// 255 when `gx² + gy² >= T²`, otherwise 0.
    #[default]
    Binary,
    /// `clamp(round(sqrt(gx² + gy²)), 0, 255)`.
    Magnitude,
}

impl ThresholdPolicy {
    /// Map a gradient pair to an output sample.
    #[inline]
    pub fn apply(self, gx: i32, gy: i32, threshold: u32) -> u8 {
        let squared = i64::from(gx) * i64::from(gx) + i64::from(gy) * i64::from(gy);
        match self {
            ThresholdPolicy::Binary => {
                let limit = i64::from(threshold) * i64::from(threshold);
                if squared >= limit {
                    255
                } else {
                    0
                }
            }
            ThresholdPolicy::Magnitude => (squared as f64).sqrt().round().min(255.0) as u8,
        }
    }
}

impl std::str::FromStr for ThresholdPolicy {
    type Err = SobelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(ThresholdPolicy::Binary),
            "magnitude" => Ok(ThresholdPolicy::Magnitude),
            other => Err(SobelError::Config(format!("unknown threshold policy '{}'", other))),
        }
    }
}

/// Parameters of one stencil evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Threads per worker (0 = rayon default).
    pub threads: usize,
    /// Threshold used by [`ThresholdPolicy::Binary`].
    pub threshold: u32,
    /// Output mapping.
    pub policy: ThresholdPolicy,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            threshold: DEFAULT_THRESHOLD,
            policy: ThresholdPolicy::Binary,
        }
    }
}

impl KernelConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the binary threshold.
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the thresholding policy.
    pub fn with_policy(mut self, policy: ThresholdPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Output of the stencil for one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeMap {
    /// Rank of the worker that produced this map.
    pub owner_index: usize,
    /// Rows of the source image this map covers.
    pub block: RowBlock,
    /// Row width in samples.
    pub width: u32,
    /// `row_count * width` output samples, row-major.
    pub samples: Vec<u8>,
}

impl EdgeMap {
    /// First covered row in image coordinates.
    pub fn origin_row(&self) -> u32 {
        self.block.origin_row
    }

    /// Number of covered rows.
    pub fn row_count(&self) -> u32 {
        self.block.row_count
    }
}

/// A configured stencil with its own thread pool.
///
/// Each worker builds one of these; the pool is not shared across workers.
#[derive(Debug)]
pub struct StencilKernel {
    config: KernelConfig,
    kernel: GradientKernel,
    pool: rayon::ThreadPool,
}

impl StencilKernel {
    /// Build a Sobel stencil with the given configuration.
    pub fn new(config: KernelConfig) -> SobelResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|index| format!("sobelgrid-stencil-{}", index))
            .build()
            .map_err(|e| SobelError::WorkerPool(e.to_string()))?;
        Ok(Self {
            config,
            kernel: SOBEL,
            pool,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Number of threads in the pool.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run the stencil over a `width × rows` grid.
    ///
    /// The returned buffer has the same shape as `samples`; boundary pixels
    /// are [`BOUNDARY_VALUE`].
    pub fn apply(&self, width: u32, rows: u32, samples: &[u8]) -> SobelResult<Vec<u8>> {
        let width = width as usize;
        let rows = rows as usize;
        if samples.len() != width * rows {
            return Err(SobelError::ShapeMismatch {
                expected: width * rows,
                actual: samples.len(),
            });
        }
        let mut output = try_alloc_zeroed(width * rows)?;
        if width < 3 || rows < 3 {
            return Ok(output);
        }

        let kernel = self.kernel;
        let KernelConfig {
            threshold, policy, ..
        } = self.config;

        self.pool.install(|| {
            output
                .par_chunks_mut(width)
                .enumerate()
                .skip(1)
                .take(rows - 2)
                .for_each(|(y, out_row)| {
                    let neighbourhood = [
                        &samples[(y - 1) * width..y * width],
                        &samples[y * width..(y + 1) * width],
                        &samples[(y + 1) * width..(y + 2) * width],
                    ];
                    for (x, out) in out_row.iter_mut().enumerate().take(width - 1).skip(1) {
                        let (gx, gy) = kernel.respond(neighbourhood, x);
                        *out = policy.apply(gx, gy, threshold);
                    }
                });
        });

        Ok(output)
    }

    /// Compute the edge map of one partition.
    ///
    /// Halo rows, when present, take part in the stencil but are not part
    /// of the result: the map always covers exactly the owned rows.
    pub fn edge_map(&self, partition: &Partition) -> SobelResult<EdgeMap> {
        let samples = if partition.has_halo() {
            let above = partition.halo_above.as_deref().unwrap_or(&[]);
            let below = partition.halo_below.as_deref().unwrap_or(&[]);
            let mut grid = try_alloc_zeroed(partition.memory_size())?;
            let (head, rest) = grid.split_at_mut(above.len());
            let (body, tail) = rest.split_at_mut(partition.samples.len());
            head.copy_from_slice(above);
            body.copy_from_slice(&partition.samples);
            tail.copy_from_slice(below);

            let width = partition.width as usize;
            let extra_rows = (above.len() + below.len()) / width.max(1);
            let computed = self.apply(
                partition.width,
                partition.row_count() + extra_rows as u32,
                &grid,
            )?;
            computed[above.len()..above.len() + partition.samples.len()].to_vec()
        } else {
            self.apply(partition.width, partition.row_count(), &partition.samples)?
        };

        Ok(EdgeMap {
            owner_index: partition.owner_index,
            block: partition.block,
            width: partition.width,
            samples,
        })
    }
}

/// Run the stencil once with a pool built for this call.
pub fn apply_stencil(
    config: KernelConfig,
    width: u32,
    rows: u32,
    samples: &[u8],
) -> SobelResult<Vec<u8>> {
    StencilKernel::new(config)?.apply(width, rows, samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::ImageBuffer;
    use crate::core::partition::{decompose, decompose_with_halo};

    fn kernel(policy: ThresholdPolicy) -> StencilKernel {
        StencilKernel::new(KernelConfig::new().with_threads(2).with_policy(policy)).unwrap()
    }

    fn at(samples: &[u8], width: usize, x: usize, y: usize) -> u8 {
        samples[y * width + x]
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let samples = vec![100u8; 8 * 8];
        for policy in [ThresholdPolicy::Binary, ThresholdPolicy::Magnitude] {
            let output = kernel(policy).apply(8, 8, &samples).unwrap();
            assert!(output.iter().all(|&s| s == 0));
        }
    }

    #[test]
    fn test_vertical_step_edge() {
        // Left half 0, right half 255; the step lies between columns 3 and 4.
        let width = 8;
        let samples: Vec<u8> = (0..8 * 6)
            .map(|i| if i % width < 4 { 0 } else { 255 })
            .collect();
        let output = kernel(ThresholdPolicy::Binary).apply(8, 6, &samples).unwrap();

        for y in 0..6 {
            for x in 0..width {
                let interior = (1..5).contains(&y) && (1..7).contains(&x);
                let expected = if interior && (x == 3 || x == 4) { 255 } else { 0 };
                assert_eq!(at(&output, width, x, y), expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_boundary_rows_and_columns_are_zero() {
        let samples: Vec<u8> = (0..7 * 5).map(|i| ((i * 37) % 251) as u8).collect();
        for policy in [ThresholdPolicy::Binary, ThresholdPolicy::Magnitude] {
            let output = kernel(policy).apply(7, 5, &samples).unwrap();
            for x in 0..7 {
                assert_eq!(at(&output, 7, x, 0), BOUNDARY_VALUE);
                assert_eq!(at(&output, 7, x, 4), BOUNDARY_VALUE);
            }
            for y in 0..5 {
                assert_eq!(at(&output, 7, 0, y), BOUNDARY_VALUE);
                assert_eq!(at(&output, 7, 6, y), BOUNDARY_VALUE);
            }
        }
    }

    #[test]
    fn test_degenerate_grids() {
        let k = kernel(ThresholdPolicy::Magnitude);
        assert_eq!(k.apply(2, 5, &[9; 10]).unwrap(), vec![0; 10]);
        assert_eq!(k.apply(5, 2, &[9; 10]).unwrap(), vec![0; 10]);
        assert!(k.apply(0, 0, &[]).unwrap().is_empty());
        assert!(matches!(k.apply(4, 4, &[0; 15]), Err(SobelError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_checkerboard_reference() {
        // 5x5 image: left two columns dark, a bright 3x3 block in the lower right.
        #[rustfmt::skip]
        let samples: Vec<u8> = vec![
            0, 0,  0,  0,  0,
            0, 0,  0,  0,  0,
            0, 0, 10, 10, 10,
            0, 0, 10, 10, 10,
            0, 0, 10, 10, 10,
        ];
        // Hand-computed gradients for the interior (x, y in 1..=3):
        //   (1,1): gx=10  gy=10    (2,1): gx=10  gy=30   (3,1): gx=0   gy=40
        //   (1,2): gx=30  gy=10    (2,2): gx=30  gy=30   (3,2): gx=0   gy=40
        //   (1,3): gx=40  gy=0     (2,3): gx=40  gy=0    (3,3): gx=0   gy=0
        let magnitude = kernel(ThresholdPolicy::Magnitude).apply(5, 5, &samples).unwrap();
        #[rustfmt::skip]
        let expected_magnitude: Vec<u8> = vec![
            0,  0,  0,  0, 0,
            0, 14, 32, 40, 0,
            0, 32, 42, 40, 0,
            0, 40, 40,  0, 0,
            0,  0,  0,  0, 0,
        ];
        assert_eq!(magnitude, expected_magnitude);

        let binary = StencilKernel::new(KernelConfig::new().with_threshold(31))
            .unwrap()
            .apply(5, 5, &samples)
            .unwrap();
        #[rustfmt::skip]
        let expected_binary: Vec<u8> = vec![
            0,   0,   0,   0, 0,
            0,   0, 255, 255, 0,
            0, 255, 255, 255, 0,
            0, 255, 255,   0, 0,
            0,   0,   0,   0, 0,
        ];
        assert_eq!(binary, expected_binary);
    }

    #[test]
    fn test_magnitude_is_clamped() {
        assert_eq!(ThresholdPolicy::Magnitude.apply(1020, 1020, 0), 255);
        assert_eq!(ThresholdPolicy::Magnitude.apply(3, 4, 0), 5);
        // sqrt(2) rounds down, sqrt(8) rounds up.
        assert_eq!(ThresholdPolicy::Magnitude.apply(1, 1, 0), 1);
        assert_eq!(ThresholdPolicy::Magnitude.apply(2, 2, 0), 3);
    }

    #[test]
    fn test_binary_threshold_is_inclusive() {
        assert_eq!(ThresholdPolicy::Binary.apply(60, 80, 100), 255);
        assert_eq!(ThresholdPolicy::Binary.apply(60, 79, 100), 0);
        assert_eq!(ThresholdPolicy::Binary.apply(-100, 0, 100), 255);
    }

    #[test]
    fn test_partition_rows_are_zeroed_at_seams() {
        let image = ImageBuffer::from_fn(6, 8, |x, y| ((x * 40 + y * 25) % 256) as u8).unwrap();
        let k = kernel(ThresholdPolicy::Magnitude);
        for partition in decompose(&image, 2).unwrap() {
            let map = k.edge_map(&partition).unwrap();
            assert_eq!(map.block, partition.block);
            let width = map.width as usize;
            let last = map.row_count() as usize - 1;
            assert!(map.samples[..width].iter().all(|&s| s == 0));
            assert!(map.samples[last * width..].iter().all(|&s| s == 0));
        }
    }

    #[test]
    fn test_halo_partitions_match_whole_image() {
        let image = ImageBuffer::from_fn(6, 8, |x, y| ((x * 40 + y * 25) % 256) as u8).unwrap();
        let k = kernel(ThresholdPolicy::Magnitude);
        let whole = k.apply(6, 8, image.as_raw()).unwrap();

        for partition in decompose_with_halo(&image, 4).unwrap() {
            let map = k.edge_map(&partition).unwrap();
            assert_eq!(map.samples.len(), partition.samples.len());
            let start = map.origin_row() as usize * 6;
            assert_eq!(map.samples, &whole[start..start + map.samples.len()]);
        }
    }

    #[test]
    fn test_threshold_policy_from_str() {
        assert_eq!("binary".parse::<ThresholdPolicy>().unwrap(), ThresholdPolicy::Binary);
        assert_eq!("Magnitude".parse::<ThresholdPolicy>().unwrap(), ThresholdPolicy::Magnitude);
        assert!("sqrt".parse::<ThresholdPolicy>().is_err());
    }

    #[test]
    fn test_kernel_config_builder() {
        let config = KernelConfig::new()
            .with_threads(8)
            .with_threshold(42)
            .with_policy(ThresholdPolicy::Magnitude);
        assert_eq!(config.threads, 8);
        assert_eq!(config.threshold, 42);
        assert_eq!(config.policy, ThresholdPolicy::Magnitude);
        assert_eq!(StencilKernel::new(config).unwrap().threads(), 8);
    }

    #[test]
    fn test_apply_stencil_one_shot() {
        let samples: Vec<u8> = (0..16).map(|i| if i % 4 < 2 { 0 } else { 200 }).collect();
        let pooled = kernel(ThresholdPolicy::Binary).apply(4, 4, &samples).unwrap();
        let one_shot = apply_stencil(KernelConfig::new().with_threads(1), 4, 4, &samples).unwrap();
        assert_eq!(pooled, one_shot);
        assert_eq!(at(&one_shot, 4, 1, 1), 255);
    }
}
