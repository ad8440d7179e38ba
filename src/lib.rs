//! # Sobelgrid - Parallel Sobel edge detection
//!
//! Sobelgrid detects edges in a raster image by applying the 3×3 Sobel
//! operator in parallel at two levels: the image is split into horizontal
//! row blocks across `W` workers, and each worker runs the stencil over its
//! block on its own thread pool.
//!
//! ## Features
//!
//! - **Row decomposition**: contiguous, gap-free partitions in owner order
//! - **Two thresholding policies**: binary (`gx² + gy² ≥ T²`) or clamped magnitude
//! - **Seam handling**: zeroed partition seams by default, or opt-in halo exchange
//! - **Order-independent reassembly**: edge maps are placed by origin row
//! - **Embeddable**: every failure is returned as a [`SobelError`](core::SobelError)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sobelgrid::prelude::*;
//!
//! let config = PipelineConfig::new()
//!     .with_workers(4)
//!     .with_policy(ThresholdPolicy::Magnitude);
//!
//! let source = PortableImageFile::new("flowers.ppm");
//! let mut sink = GraymapFile::new("sobelHybrid.pgm");
//! let report = Orchestrator::new(config).run(&source, &mut sink)?;
//! println!("Execution Time: {:.6} seconds", report.slowest_kernel().as_secs_f64());
//! # Ok::<(), SobelError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: buffers, decomposition, the stencil kernel, reassembly,
//!   configuration and errors
//! - [`execution`]: worker communication, the orchestrator state machine
//!   and progress reporting
//! - [`io`]: pixmap decoding, graymap encoding and in-memory endpoints

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod execution;
pub mod io;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use sobelgrid::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::buffer::{Dimensions, ImageBuffer};
    pub use crate::core::partition::{decompose, decompose_with_halo, Partition, RowBlock};
    pub use crate::core::kernel::{apply_stencil, EdgeMap, KernelConfig, StencilKernel, ThresholdPolicy};
    pub use crate::core::aggregate::{aggregate, EdgeMapSink};

    // Configuration
    pub use crate::core::config::{BoundaryPolicy, PipelineConfig};

    // Errors
    pub use crate::core::error::{SobelError, SobelResult};

    // Execution
    pub use crate::execution::orchestrator::{Orchestrator, OrchestratorState, RunReport, WorkerStats};
    pub use crate::execution::progress::{ProgressCallback, ProgressTracker, ProgressUpdate};

    // I/O
    pub use crate::io::{
        GraymapFile, ImageSink, ImageSource, MemorySink, MemorySource, PortableImageFile,
    };
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
