//! Core types for the Sobelgrid edge detection pipeline.
//!
//! This module contains the pieces of the pipeline that do not involve
//! worker communication:
//! - Intensity buffers and dimensions
//! - Row decomposition into partitions
//! - The Sobel stencil kernel and thresholding policies
//! - Reassembly of edge maps
//! - Configuration and error types

pub mod aggregate;
pub mod buffer;
pub mod config;
pub mod error;
pub mod kernel;
pub mod partition;

// Re-export commonly used types
pub use aggregate::{aggregate, EdgeMapSink};
pub use buffer::{Dimensions, ImageBuffer};
pub use config::{BoundaryPolicy, PipelineConfig};
pub use error::{SobelError, SobelResult};
pub use kernel::{apply_stencil, EdgeMap, GradientKernel, KernelConfig, StencilKernel, ThresholdPolicy, SOBEL};
pub use partition::{decompose, decompose_with_halo, Partition, RowBlock, RowBlockIterator};
