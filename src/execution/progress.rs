//! Progress tracking for pipeline runs.

use crate::execution::orchestrator::OrchestratorState;
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A progress update event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    /// The run has started.
    Started {
        workers: usize,
    },
    /// The coordinating worker moved to a new state.
    StateChanged {
        from: OrchestratorState,
        to: OrchestratorState,
    },
    /// A worker finished its stencil pass.
    WorkerCompleted {
        rank: usize,
        rows: u32,
        duration_ms: u64,
        completed: usize,
        total: usize,
    },
    /// Overall progress percentage over the compute phase.
    Progress {
        percent: f32,
        elapsed_ms: u64,
    },
    /// The run has completed.
    Completed {
        total_duration_ms: u64,
        workers: usize,
    },
    /// The run failed.
    Failed {
        state: OrchestratorState,
        message: String,
    },
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Tracks the progress of one run.
///
/// Shared by reference between the coordinating worker and the computing
/// workers; every method takes `&self`.
pub struct ProgressTracker {
    /// Number of workers in the run.
    total_workers: usize,
    /// Number of workers that finished computing.
    completed_workers: AtomicU64,
    /// Start time.
    start_time: Option<Instant>,
    /// Progress callback.
    callback: Option<ProgressCallback>,
    /// Every state the coordinator has entered, in order.
    transitions: parking_lot::Mutex<Vec<OrchestratorState>>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("total_workers", &self.total_workers)
            .field("completed_workers", &self.completed_workers)
            .field("callback", &self.callback.as_ref().map(|_| "<callback>"))
            .field("transitions", &*self.transitions.lock())
            .finish()
    }
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new(total_workers: usize) -> Self {
        Self {
            total_workers,
            completed_workers: AtomicU64::new(0),
            start_time: None,
            callback: None,
            transitions: parking_lot::Mutex::new(vec![OrchestratorState::Idle]),
        }
    }

    /// Set a callback for progress updates.
    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Attach a shared callback.
    pub fn with_shared_callback(self, callback: Option<Arc<ProgressCallback>>) -> Self {
        match callback {
            Some(callback) => self.with_callback(Box::new(move |update| callback(update))),
            None => self,
        }
    }

    /// Start tracking.
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        self.send_update(ProgressUpdate::Started {
            workers: self.total_workers,
        });
    }

    /// Record a coordinator state transition.
    pub fn transition(&self, to: OrchestratorState) {
        let from = {
            let mut transitions = self.transitions.lock();
            let from = transitions.last().copied().unwrap_or(OrchestratorState::Idle);
            transitions.push(to);
            from
        };
        debug!("Coordinator state {:?} -> {:?}", from, to);
        self.send_update(ProgressUpdate::StateChanged { from, to });
    }

    /// Current coordinator state.
    pub fn state(&self) -> OrchestratorState {
        self.transitions
            .lock()
            .last()
            .copied()
            .unwrap_or(OrchestratorState::Idle)
    }

    /// All states entered so far, starting with [`OrchestratorState::Idle`].
    pub fn transitions(&self) -> Vec<OrchestratorState> {
        self.transitions.lock().clone()
    }

    /// Report that a worker finished its stencil pass.
    pub fn worker_completed(&self, rank: usize, rows: u32, duration_ms: u64) {
        let completed = self.completed_workers.fetch_add(1, Ordering::Relaxed) as usize + 1;
        self.send_update(ProgressUpdate::WorkerCompleted {
            rank,
            rows,
            duration_ms,
            completed,
            total: self.total_workers,
        });
        self.send_update(ProgressUpdate::Progress {
            percent: self.progress_percent(),
            elapsed_ms: self.elapsed_ms(),
        });
    }

    /// Report a fatal error, moving the coordinator to `Failed`.
    pub fn fail(&self, message: String) {
        let state = self.state();
        self.transition(OrchestratorState::Failed);
        self.send_update(ProgressUpdate::Failed { state, message });
    }

    /// Complete tracking.
    pub fn complete(&self) {
        self.send_update(ProgressUpdate::Completed {
            total_duration_ms: self.elapsed_ms(),
            workers: self.total_workers,
        });
    }

    /// Share of workers that finished computing.
    pub fn progress_percent(&self) -> f32 {
        if self.total_workers == 0 {
            return 100.0;
        }
        let completed = self.completed_workers.load(Ordering::Relaxed);
        (completed as f32 / self.total_workers as f32) * 100.0
    }

    fn elapsed_ms(&self) -> u64 {
        self.start_time
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    fn send_update(&self, update: ProgressUpdate) {
        if let Some(ref callback) = self.callback {
            callback(update);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_progress_calculation() {
        let tracker = ProgressTracker::new(4);
        assert_eq!(tracker.progress_percent(), 0.0);

        tracker.worker_completed(0, 10, 5);
        tracker.worker_completed(3, 10, 7);
        assert_eq!(tracker.progress_percent(), 50.0);
    }

    #[test]
    fn test_transitions_recorded() {
        let tracker = ProgressTracker::new(1);
        assert_eq!(tracker.state(), OrchestratorState::Idle);

        tracker.transition(OrchestratorState::Loading);
        tracker.fail("boom".to_string());
        assert_eq!(
            tracker.transitions(),
            vec![
                OrchestratorState::Idle,
                OrchestratorState::Loading,
                OrchestratorState::Failed
            ]
        );
    }

    #[test]
    fn test_callback_invoked() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let mut tracker = ProgressTracker::new(2).with_callback(Box::new(move |_| {
            call_count_clone.fetch_add(1, Ordering::Relaxed);
        }));

        tracker.start();
        tracker.transition(OrchestratorState::Loading);
        tracker.worker_completed(1, 4, 100);

        // Started, StateChanged, WorkerCompleted, Progress
        assert_eq!(call_count.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_failed_update_carries_state() {
        let updates = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = updates.clone();
        let tracker = ProgressTracker::new(1).with_callback(Box::new(move |update| {
            sink.lock().push(update);
        }));

        tracker.transition(OrchestratorState::Collecting);
        tracker.fail("missing owner".to_string());

        let updates = updates.lock();
        assert!(updates.contains(&ProgressUpdate::Failed {
            state: OrchestratorState::Collecting,
            message: "missing owner".to_string(),
        }));
    }
}
