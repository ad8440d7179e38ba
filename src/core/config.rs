//! Pipeline configuration.
//!
//! Everything that varies between runs (worker count, stencil threads,
//! threshold, thresholding policy, seam handling) lives here and is passed
//! explicitly into the pipeline. Configurations can be built in code with
//! the `with_*` methods or loaded from a TOML file:
//!
//! ```toml
//! workers = 4
//! boundary = "halo-exchange"
//!
//! [kernel]
//! threads = 8
//! threshold = 100
//! policy = "magnitude"
//! ```

use crate::core::error::{SobelError, SobelResult};
use crate::core::kernel::{KernelConfig, ThresholdPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How partition seams are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryPolicy {
    /// No rows are exchanged; each seam yields a one-pixel zero stripe.
    #[default]
    ZeroSeams,
    /// Each partition also receives its neighbours' adjacent rows, so seams
    /// carry gradient information. Changes the output relative to
    /// [`BoundaryPolicy::ZeroSeams`].
    HaloExchange,
}

/// Configuration of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of workers the image is split across.
    pub workers: usize,
    /// Stencil parameters applied by every worker.
    pub kernel: KernelConfig,
    /// Seam handling.
    pub boundary: BoundaryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            kernel: KernelConfig::default(),
            boundary: BoundaryPolicy::ZeroSeams,
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the per-worker stencil thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.kernel.threads = threads;
        self
    }

    /// Set the binary threshold.
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.kernel.threshold = threshold;
        self
    }

    /// Set the thresholding policy.
    pub fn with_policy(mut self, policy: ThresholdPolicy) -> Self {
        self.kernel.policy = policy;
        self
    }

    /// Set the seam handling.
    pub fn with_boundary(mut self, boundary: BoundaryPolicy) -> Self {
        self.boundary = boundary;
        self
    }

    /// Parse a TOML document. Missing keys take their default values.
    pub fn from_toml_str(source: &str) -> SobelResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| SobelError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> SobelResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            SobelError::Config(format!("failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&source)
    }

    /// Reject configurations that can never run.
    ///
    /// Whether the worker count fits a particular image is only known once
    /// the image is loaded; see [`crate::core::partition::RowBlockIterator`].
    pub fn validate(&self) -> SobelResult<()> {
        if self.workers == 0 {
            return Err(SobelError::Config("workers must be at least 1".to_string()));
        }
        Ok(())
    }
}
