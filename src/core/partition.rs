//! Row decomposition of an image into per-worker partitions.
//!
//! An image of height `H` is split into `W` contiguous row blocks of
//! `H / W` rows each. Blocks are produced in increasing row order and
//! together cover `[0, H)` with no gap and no overlap.
//!
//! # Halo rows
//!
//! By default a partition carries only the rows it owns, so the stencil
//! cannot see across a seam and the seam rows come out as zero. With
//! [`decompose_with_halo`] every partition additionally carries the row
//! directly above and below it (when those exist in the source image).

use crate::core::buffer::{try_alloc_zeroed, ImageBuffer};
use crate::core::error::{SobelError, SobelResult};

/// A contiguous range of rows within an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBlock {
    /// First row of the block.
    pub origin_row: u32,
    /// Number of rows in the block.
    pub row_count: u32,
}

impl RowBlock {
    /// Create a new row block.
    pub fn new(origin_row: u32, row_count: u32) -> Self {
        Self {
            origin_row,
            row_count,
        }
    }

    /// Row just past the end of the block.
    pub fn end_row(&self) -> u32 {
        self.origin_row + self.row_count
    }

    /// Expand the block by `halo` rows on each side, clamped to the image.
    pub fn expand_with_halo(&self, halo: u32, image_height: u32) -> Self {
        let start = self.origin_row.saturating_sub(halo);
        let end = (self.end_row() + halo).min(image_height);
        Self {
            origin_row: start,
            row_count: end - start,
        }
    }

    /// Whether `row` falls inside the block.
    pub fn contains(&self, row: u32) -> bool {
        row >= self.origin_row && row < self.end_row()
    }
}

/// Iterator over the equal-height row blocks of an image.
#[derive(Debug, Clone)]
pub struct RowBlockIterator {
    rows_per_block: u32,
    remaining: usize,
    next_row: u32,
}

impl RowBlockIterator {
    /// Plan `workers` blocks over an image of `height` rows.
    ///
    /// Fails with [`SobelError::InvalidTopology`] when `workers` is zero,
    /// exceeds `height`, or does not divide `height` evenly.
    pub fn new(height: u32, workers: usize) -> SobelResult<Self> {
        if workers == 0 {
            return Err(SobelError::topology(workers, height, "at least one worker is required"));
        }
        if workers > height as usize {
            return Err(SobelError::topology(
                workers,
                height,
                "more workers than image rows",
            ));
        }
        // workers <= height, so the cast is lossless.
        let workers_u32 = workers as u32;
        if height % workers_u32 != 0 {
            return Err(SobelError::topology(
                workers,
                height,
                format!(
                    "height is not divisible by the worker count ({} rows left over)",
                    height % workers_u32
                ),
            ));
        }
        Ok(Self {
            rows_per_block: height / workers_u32,
            remaining: workers,
            next_row: 0,
        })
    }

    /// Rows assigned to each block.
    pub fn rows_per_block(&self) -> u32 {
        self.rows_per_block
    }
}

impl Iterator for RowBlockIterator {
    type Item = RowBlock;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let block = RowBlock::new(self.next_row, self.rows_per_block);
        self.next_row += self.rows_per_block;
        self.remaining -= 1;
        Some(block)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for RowBlockIterator {}

/// The slice of an image handed to a single worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Rank of the worker that owns this partition.
    pub owner_index: usize,
    /// Rows owned by this partition.
    pub block: RowBlock,
    /// Row width in samples.
    pub width: u32,
    /// Owned samples, `row_count * width`, row-major.
    pub samples: Vec<u8>,
    /// Row directly above the block, when halo exchange is enabled.
    pub halo_above: Option<Vec<u8>>,
    /// Row directly below the block, when halo exchange is enabled.
    pub halo_below: Option<Vec<u8>>,
}

impl Partition {
    /// First owned row in image coordinates.
    pub fn origin_row(&self) -> u32 {
        self.block.origin_row
    }

    /// Number of owned rows.
    pub fn row_count(&self) -> u32 {
        self.block.row_count
    }

    /// Whether this partition carries any halo rows.
    pub fn has_halo(&self) -> bool {
        self.halo_above.is_some() || self.halo_below.is_some()
    }

    /// Payload size in bytes, halo rows included.
    pub fn memory_size(&self) -> usize {
        self.samples.len()
            + self.halo_above.as_ref().map_or(0, Vec::len)
            + self.halo_below.as_ref().map_or(0, Vec::len)
    }
}

fn copy_rows(image: &ImageBuffer, start: u32, count: u32) -> SobelResult<Vec<u8>> {
    let source = image.rows(start, count);
    let mut samples = try_alloc_zeroed(source.len())?;
    samples.copy_from_slice(source);
    Ok(samples)
}

fn split(image: &ImageBuffer, workers: usize, halo: bool) -> SobelResult<Vec<Partition>> {
    let blocks = RowBlockIterator::new(image.height(), workers)?;
    let mut partitions = Vec::with_capacity(blocks.len());

    for (owner_index, block) in blocks.enumerate() {
        let (halo_above, halo_below) = if halo {
            let expanded = block.expand_with_halo(1, image.height());
            let above = if expanded.origin_row < block.origin_row {
                Some(copy_rows(image, expanded.origin_row, 1)?)
            } else {
                None
            };
            let below = if expanded.end_row() > block.end_row() {
                Some(copy_rows(image, block.end_row(), 1)?)
            } else {
                None
            };
            (above, below)
        } else {
            (None, None)
        };

        partitions.push(Partition {
            owner_index,
            block,
            width: image.width(),
            samples: copy_rows(image, block.origin_row, block.row_count)?,
            halo_above,
            halo_below,
        });
    }

    Ok(partitions)
}

/// Split `image` into `workers` contiguous row partitions.
///
/// Partition `i` is owned by worker `i` and spans rows
/// `[i * H / W, (i + 1) * H / W)`. The source buffer is not modified.
pub fn decompose(image: &ImageBuffer, workers: usize) -> SobelResult<Vec<Partition>> {
    split(image, workers, false)
}

/// Like [`decompose`], but each partition also carries its neighbouring rows.
pub fn decompose_with_halo(image: &ImageBuffer, workers: usize) -> SobelResult<Vec<Partition>> {
    split(image, workers, true)
}
