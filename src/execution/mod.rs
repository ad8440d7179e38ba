//! Parallel execution.
//!
//! This module runs the pipeline across workers: the collectives they
//! communicate through, the orchestrator state machine and progress
//! reporting.

pub mod comm;
pub mod orchestrator;
pub mod progress;

pub use comm::{Communicator, Topology};
pub use orchestrator::{Orchestrator, OrchestratorState, RunReport, WorkerStats};
pub use progress::{ProgressCallback, ProgressTracker, ProgressUpdate};
