//! Reassembly of per-worker edge maps into one image.
//!
//! Maps are placed by their origin row, never by arrival order, so workers
//! may finish in any order.

use crate::core::buffer::{Dimensions, ImageBuffer};
use crate::core::error::{SobelError, SobelResult};
use crate::core::kernel::EdgeMap;

/// Accumulates edge maps into a full-size output buffer.
#[derive(Debug)]
pub struct EdgeMapSink {
    output: ImageBuffer,
    expected: usize,
    owners: Vec<bool>,
    covered: Vec<bool>,
    received: usize,
}

impl EdgeMapSink {
    /// Create a sink for an image of `dimensions` split across `workers`.
    pub fn new(dimensions: Dimensions, workers: usize) -> SobelResult<Self> {
        Ok(Self {
            output: ImageBuffer::try_zeroed(dimensions.width, dimensions.height)?,
            expected: workers,
            owners: vec![false; workers],
            covered: vec![false; dimensions.height as usize],
            received: 0,
        })
    }

    /// Number of maps written so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Copy one edge map into place.
    ///
    /// Fails with [`SobelError::IncompletePartitionSet`] if the owner index
    /// is out of range or already seen, or if the map's rows fall outside
    /// the image or overlap a previously written map.
    pub fn write(&mut self, map: &EdgeMap) -> SobelResult<()> {
        if map.owner_index >= self.expected {
            return Err(SobelError::incomplete(
                self.expected,
                self.received,
                format!("owner index {} out of range", map.owner_index),
            ));
        }
        if self.owners[map.owner_index] {
            return Err(SobelError::incomplete(
                self.expected,
                self.received,
                format!("duplicate owner index {}", map.owner_index),
            ));
        }
        if map.width != self.output.width() || map.block.end_row() > self.output.height() {
            return Err(SobelError::incomplete(
                self.expected,
                self.received,
                format!(
                    "map from owner {} ({} rows at row {}, width {}) does not fit a {}x{} image",
                    map.owner_index,
                    map.row_count(),
                    map.origin_row(),
                    map.width,
                    self.output.width(),
                    self.output.height()
                ),
            ));
        }
        let rows = map.origin_row() as usize..map.block.end_row() as usize;
        if self.covered[rows.clone()].iter().any(|&c| c) {
            return Err(SobelError::incomplete(
                self.expected,
                self.received,
                format!("map from owner {} overlaps another partition", map.owner_index),
            ));
        }
        let expected_len = map.row_count() as usize * map.width as usize;
        if map.samples.len() != expected_len {
            return Err(SobelError::ShapeMismatch {
                expected: expected_len,
                actual: map.samples.len(),
            });
        }

        self.output
            .rows_mut(map.origin_row(), map.row_count())
            .copy_from_slice(&map.samples);
        self.covered[rows].iter_mut().for_each(|c| *c = true);
        self.owners[map.owner_index] = true;
        self.received += 1;
        Ok(())
    }

    /// Check completeness and return the assembled image.
    pub fn finish(self) -> SobelResult<ImageBuffer> {
        if self.received != self.expected {
            let missing: Vec<usize> = self
                .owners
                .iter()
                .enumerate()
                .filter(|&(_, &seen)| !seen)
                .map(|(owner, _)| owner)
                .collect();
            return Err(SobelError::incomplete(
                self.expected,
                self.received,
                format!("missing owner(s) {:?}", missing),
            ));
        }
        if let Some(row) = self.covered.iter().position(|&c| !c) {
            return Err(SobelError::incomplete(
                self.expected,
                self.received,
                format!("row {} is not covered by any partition", row),
            ));
        }
        Ok(self.output)
    }
}

/// Assemble `maps` into a single image of `dimensions`.
///
/// Exactly `workers` maps with distinct owner indices must be supplied.
pub fn aggregate(
    dimensions: Dimensions,
    workers: usize,
    mut maps: Vec<EdgeMap>,
) -> SobelResult<ImageBuffer> {
    if maps.len() < workers {
        return Err(SobelError::incomplete(
            workers,
            maps.len(),
            "fewer edge maps than workers",
        ));
    }
    maps.sort_by_key(EdgeMap::origin_row);

    let mut sink = EdgeMapSink::new(dimensions, workers)?;
    for map in &maps {
        sink.write(map)?;
    }
    sink.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::partition::{decompose, RowBlock};
    use proptest::prelude::*;

    fn passthrough(partition: crate::core::partition::Partition) -> EdgeMap {
        EdgeMap {
            owner_index: partition.owner_index,
            block: partition.block,
            width: partition.width,
            samples: partition.samples,
        }
    }

    #[test]
    fn test_out_of_order_arrival() {
        let image = ImageBuffer::from_fn(3, 6, |x, y| (x + y * 3) as u8).unwrap();
        let mut maps: Vec<_> = decompose(&image, 3).unwrap().into_iter().map(passthrough).collect();
        maps.reverse();
        let rebuilt = aggregate(image.dimensions(), 3, maps).unwrap();
        assert_eq!(rebuilt, image);
    }

    #[test]
    fn test_missing_partition() {
        let image = ImageBuffer::try_zeroed(3, 6).unwrap();
        let mut maps: Vec<_> = decompose(&image, 3).unwrap().into_iter().map(passthrough).collect();
        maps.pop();
        let result = aggregate(image.dimensions(), 3, maps);
        assert!(matches!(
            result,
            Err(SobelError::IncompletePartitionSet { expected: 3, received: 2, .. })
        ));
    }

    #[test]
    fn test_duplicate_owner() {
        let image = ImageBuffer::try_zeroed(3, 4).unwrap();
        let mut maps: Vec<_> = decompose(&image, 2).unwrap().into_iter().map(passthrough).collect();
        maps[1].owner_index = 0;
        let result = aggregate(image.dimensions(), 2, maps);
        assert!(matches!(result, Err(SobelError::IncompletePartitionSet { .. })));
    }

    #[test]
    fn test_owner_out_of_range() {
        let mut sink = EdgeMapSink::new(Dimensions::new(2, 2), 1).unwrap();
        let map = EdgeMap {
            owner_index: 1,
            block: RowBlock::new(0, 2),
            width: 2,
            samples: vec![0; 4],
        };
        assert!(matches!(sink.write(&map), Err(SobelError::IncompletePartitionSet { .. })));
    }

    #[test]
    fn test_overlapping_rows() {
        let mut sink = EdgeMapSink::new(Dimensions::new(2, 4), 2).unwrap();
        let first = EdgeMap {
            owner_index: 0,
            block: RowBlock::new(0, 3),
            width: 2,
            samples: vec![1; 6],
        };
        let second = EdgeMap {
            owner_index: 1,
            block: RowBlock::new(2, 2),
            width: 2,
            samples: vec![2; 4],
        };
        sink.write(&first).unwrap();
        assert!(sink.write(&second).is_err());
        assert_eq!(sink.received(), 1);
        assert!(sink.finish().is_err());
    }

    proptest! {
        #[test]
        fn prop_decompose_aggregate_round_trip(
            width in 1u32..12,
            rows_per in 1u32..8,
            workers in 1usize..8,
            value in any::<u8>(),
        ) {
            let height = rows_per * workers as u32;
            let image = ImageBuffer::from_fn(width, height, |_, _| value).unwrap();
            let maps: Vec<_> = decompose(&image, workers).unwrap().into_iter().map(passthrough).collect();
            let rebuilt = aggregate(image.dimensions(), workers, maps).unwrap();
            prop_assert_eq!(rebuilt, image);
        }
    }
}
