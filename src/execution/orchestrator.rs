//! Run coordination.
//!
//! An [`Orchestrator`] runs one edge-detection pass over `W` workers. Rank 0
//! (the coordinator, running on the calling thread) loads the image,
//! broadcasts its dimensions, scatters one row partition to every rank,
//! computes its own partition, gathers the edge maps back and writes the
//! assembled result. Ranks `1..W` run on scoped threads and only ever see
//! their own partition.
//!
//! The coordinator moves through
//! `Idle → Loading → Distributing → Computing → Collecting → Writing → Done`;
//! any error moves it to `Failed`, which is terminal. Dropping the
//! coordinator's communicator on failure releases every worker still
//! blocked in a collective, so no thread outlives the run.

use crate::core::aggregate::aggregate;
use crate::core::buffer::{Dimensions, ImageBuffer};
use crate::core::config::{BoundaryPolicy, PipelineConfig};
use crate::core::error::{SobelError, SobelResult};
use crate::core::kernel::{EdgeMap, KernelConfig, StencilKernel, ThresholdPolicy};
use crate::core::partition::{decompose, decompose_with_halo, Partition, RowBlockIterator};
use crate::execution::comm::{Communicator, Topology, ROOT};
use crate::execution::progress::{ProgressCallback, ProgressTracker, ProgressUpdate};
use crate::io::{ImageSink, ImageSource, MemorySink, MemorySource};
use log::{debug, error, info};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// States of the coordinating worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorState {
    /// Nothing has happened yet.
    Idle,
    /// Reading and decoding the source image.
    Loading,
    /// Broadcasting dimensions and scattering partitions.
    Distributing,
    /// Running the stencil on the coordinator's own partition.
    Computing,
    /// Gathering edge maps and reassembling them.
    Collecting,
    /// Persisting the output.
    Writing,
    /// The run finished and the output was written.
    Done,
    /// The run aborted.
    Failed,
}

impl OrchestratorState {
    /// Whether no further transition can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrchestratorState::Done | OrchestratorState::Failed)
    }
}

/// Timing of one worker's stencil pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerStats {
    /// Worker rank.
    pub rank: usize,
    /// First row the worker owned.
    pub origin_row: u32,
    /// Number of rows the worker owned.
    pub row_count: u32,
    /// Wall time of the stencil pass alone.
    pub kernel_duration: Duration,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Size of the processed image.
    pub dimensions: Dimensions,
    /// Number of workers.
    pub workers: usize,
    /// Threads per worker stencil pool.
    pub threads: usize,
    /// Thresholding policy in effect.
    pub policy: ThresholdPolicy,
    /// Seam handling in effect.
    pub boundary: BoundaryPolicy,
    /// Per-worker timings, ordered by rank.
    pub worker_stats: Vec<WorkerStats>,
    /// Wall time of the whole run, loading and writing included.
    pub total_duration: Duration,
}

impl RunReport {
    /// The longest stencil pass, which bounds the compute phase.
    pub fn slowest_kernel(&self) -> Duration {
        self.worker_stats
            .iter()
            .map(|stats| stats.kernel_duration)
            .max()
            .unwrap_or_default()
    }
}

/// Result a worker hands back at the gather.
#[derive(Debug, Clone)]
enum WorkerOutcome {
    Computed { map: EdgeMap, stats: WorkerStats },
    Failed { rank: usize, kind: String, reason: String },
}

/// Payloads exchanged between ranks.
#[derive(Debug, Clone)]
enum Message {
    Dimensions(Dimensions),
    Partition(Partition),
    Outcome(Box<WorkerOutcome>),
}

impl Message {
    fn label(&self) -> &'static str {
        match self {
            Message::Dimensions(_) => "dimensions",
            Message::Partition(_) => "partition",
            Message::Outcome(_) => "outcome",
        }
    }
}

fn unexpected(rank: usize, wanted: &str, got: &Message) -> SobelError {
    SobelError::Communication {
        rank,
        reason: format!("expected {}, received {}", wanted, got.label()),
    }
}

/// Coordinates one parallel edge-detection run.
pub struct Orchestrator {
    config: PipelineConfig,
    progress_callback: Option<Arc<ProgressCallback>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("progress_callback", &self.progress_callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Orchestrator {
    /// Create an orchestrator for `config`.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            progress_callback: None,
        }
    }

    /// Receive progress updates during runs.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(Box::new(callback)));
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline from `source` to `sink`.
    pub fn run(&self, source: &dyn ImageSource, sink: &mut dyn ImageSink) -> SobelResult<RunReport> {
        self.run_tracked(source, sink).0
    }

    /// Run on an in-memory intensity buffer and return the edge map.
    pub fn process(&self, image: ImageBuffer) -> SobelResult<(ImageBuffer, RunReport)> {
        let source = MemorySource::new(image);
        let mut sink = MemorySink::new();
        let report = self.run(&source, &mut sink)?;
        let output = sink
            .take_image()
            .ok_or_else(|| SobelError::incomplete(self.config.workers, 0, "sink received no image"))?;
        Ok((output, report))
    }

    /// Run and also return the coordinator's state history.
    pub fn run_tracked(
        &self,
        source: &dyn ImageSource,
        sink: &mut dyn ImageSink,
    ) -> (SobelResult<RunReport>, Vec<OrchestratorState>) {
        let mut tracker = ProgressTracker::new(self.config.workers)
            .with_shared_callback(self.progress_callback.clone());
        tracker.start();

        let result = self.execute(source, sink, &tracker);
        if let Err(ref e) = result {
            error!("Run failed in state {:?}: {}", tracker.state(), e);
            tracker.fail(e.to_string());
        }
        (result, tracker.transitions())
    }

    fn execute(
        &self,
        source: &dyn ImageSource,
        sink: &mut dyn ImageSink,
        tracker: &ProgressTracker,
    ) -> SobelResult<RunReport> {
        self.config.validate()?;
        let topology = Topology::new(self.config.workers)?;
        let started = Instant::now();
        info!(
            "Starting run with {} worker(s), {} thread(s) each, {:?} seams",
            topology.size(),
            self.config.kernel.threads,
            self.config.boundary
        );

        let mut comms = topology.communicators::<Message>().into_iter();
        let root = comms
            .next()
            .ok_or_else(|| SobelError::Config("topology produced no coordinator".to_string()))?;

        let scoped = crossbeam::scope(|scope| {
            let handles: Vec<_> = comms
                .map(|comm| {
                    let rank = comm.rank();
                    let kernel = self.config.kernel;
                    (rank, scope.spawn(move |_| run_worker(comm, kernel, tracker)))
                })
                .collect();

            let result = self.coordinate(root, source, sink, tracker);

            let mut panicked = None;
            for (rank, handle) in handles {
                match handle.join() {
                    Ok(Ok(())) => {}
                    // Secondary to whatever the coordinator reports.
                    Ok(Err(e)) => debug!("Worker {} stopped: {}", rank, e),
                    Err(_) => {
                        error!("Worker {} panicked", rank);
                        panicked.get_or_insert(SobelError::WorkerPanicked { rank });
                    }
                }
            }
            match (result, panicked) {
                (Err(e), _) => Err(e),
                (Ok(_), Some(e)) => Err(e),
                (Ok(parts), None) => Ok(parts),
            }
        });

        let (dimensions, worker_stats) =
            scoped.map_err(|_| SobelError::WorkerPanicked { rank: ROOT })??;

        tracker.transition(OrchestratorState::Done);
        tracker.complete();

        let report = RunReport {
            dimensions,
            workers: topology.size(),
            threads: self.config.kernel.threads,
            policy: self.config.kernel.policy,
            boundary: self.config.boundary,
            worker_stats,
            total_duration: started.elapsed(),
        };
        info!(
            "Run complete: {}x{} in {:.3}s (slowest worker {:.3}s)",
            dimensions.width,
            dimensions.height,
            report.total_duration.as_secs_f64(),
            report.slowest_kernel().as_secs_f64()
        );
        Ok(report)
    }

    /// Rank 0's side of the run. `root` is consumed so every exit path
    /// hangs up on the workers.
    fn coordinate(
        &self,
        root: Communicator<Message>,
        source: &dyn ImageSource,
        sink: &mut dyn ImageSink,
        tracker: &ProgressTracker,
    ) -> SobelResult<(Dimensions, Vec<WorkerStats>)> {
        tracker.transition(OrchestratorState::Loading);
        let image = source.load()?;
        let dimensions = image.dimensions();
        debug!(
            "Loaded {}x{} image from {}",
            dimensions.width,
            dimensions.height,
            source.describe()
        );

        tracker.transition(OrchestratorState::Distributing);
        root.broadcast(Some(Message::Dimensions(dimensions)))?;
        let partitions = match self.config.boundary {
            BoundaryPolicy::ZeroSeams => decompose(&image, root.size())?,
            BoundaryPolicy::HaloExchange => decompose_with_halo(&image, root.size())?,
        };
        drop(image);
        let own = match root.scatter(Some(partitions.into_iter().map(Message::Partition).collect()))? {
            Message::Partition(partition) => partition,
            other => return Err(unexpected(ROOT, "partition", &other)),
        };

        tracker.transition(OrchestratorState::Computing);
        let outcome = compute(ROOT, &own, self.config.kernel, tracker);
        drop(own);

        tracker.transition(OrchestratorState::Collecting);
        let gathered = root
            .gather(Message::Outcome(Box::new(outcome)))?
            .ok_or_else(|| SobelError::incomplete(root.size(), 0, "coordinator gathered nothing"))?;
        drop(root);

        let mut maps = Vec::with_capacity(gathered.len());
        let mut stats = Vec::with_capacity(gathered.len());
        for message in gathered {
            match message {
                Message::Outcome(outcome) => match *outcome {
                    WorkerOutcome::Computed { map, stats: s } => {
                        maps.push(map);
                        stats.push(s);
                    }
                    WorkerOutcome::Failed { rank, kind, reason } => {
                        return Err(SobelError::WorkerFailed { rank, kind, reason })
                    }
                },
                other => return Err(unexpected(ROOT, "outcome", &other)),
            }
        }
        let output = aggregate(dimensions, self.config.workers, maps)?;
        stats.sort_by_key(|s| s.rank);

        tracker.transition(OrchestratorState::Writing);
        sink.persist(&output)?;
        debug!("Wrote edge map to {}", sink.describe());

        Ok((dimensions, stats))
    }
}

/// Apply the stencil to one partition, turning errors into a reportable
/// outcome instead of abandoning the gather.
fn compute(
    rank: usize,
    partition: &Partition,
    config: KernelConfig,
    tracker: &ProgressTracker,
) -> WorkerOutcome {
    let result = StencilKernel::new(config).and_then(|kernel| {
        let started = Instant::now();
        let map = kernel.edge_map(partition)?;
        Ok((map, started.elapsed()))
    });

    match result {
        Ok((map, kernel_duration)) => {
            debug!(
                "Worker {} computed rows {}..{} in {:?}",
                rank,
                partition.origin_row(),
                partition.block.end_row(),
                kernel_duration
            );
            tracker.worker_completed(rank, partition.row_count(), kernel_duration.as_millis() as u64);
            WorkerOutcome::Computed {
                map,
                stats: WorkerStats {
                    rank,
                    origin_row: partition.origin_row(),
                    row_count: partition.row_count(),
                    kernel_duration,
                },
            }
        }
        Err(e) => WorkerOutcome::Failed {
            rank,
            kind: e.kind().to_string(),
            reason: e.to_string(),
        },
    }
}

/// A non-coordinating rank's side of the run.
fn run_worker(
    comm: Communicator<Message>,
    config: KernelConfig,
    tracker: &ProgressTracker,
) -> SobelResult<()> {
    let rank = comm.rank();
    let dimensions = match comm.broadcast(None)? {
        Message::Dimensions(dimensions) => dimensions,
        other => return Err(unexpected(rank, "dimensions", &other)),
    };
    // Every rank can size its own share from the broadcast alone.
    let expected = RowBlockIterator::new(dimensions.height, comm.size())?.nth(rank);

    let partition = match comm.scatter(None)? {
        Message::Partition(partition) => partition,
        other => return Err(unexpected(rank, "partition", &other)),
    };

    let outcome = if Some(partition.block) == expected && partition.width == dimensions.width {
        compute(rank, &partition, config, tracker)
    } else {
        WorkerOutcome::Failed {
            rank,
            kind: "invalid_topology".to_string(),
            reason: format!(
                "received rows {}..{}, expected {:?}",
                partition.origin_row(),
                partition.block.end_row(),
                expected
            ),
        }
    };
    drop(partition);

    comm.gather(Message::Outcome(Box::new(outcome)))?;
    Ok(())
}
