use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::StepError;
use crate::progress::{Progress, ProgressSink, ProgressTracker};
use crate::step::{ChainStep, StepContext, StepOutcome, StepRecord};

// ---------------------------------------------------------------------------
// ChainState
// ---------------------------------------------------------------------------

/// Lifecycle of one chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChainState {
    /// Steps assembled, nothing started.
    Built,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ChainState {
    /// Returns `true` for `Completed`, `Failed`, and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Built => "built",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ChainReport
// ---------------------------------------------------------------------------

/// The outcome of running a chain to a terminal state.
///
/// The context is returned in every case, so values accumulated before a
/// failure or cancellation stay inspectable.
pub struct ChainReport<C, E> {
    /// Name of the chain.
    pub chain: String,
    /// Terminal state.
    pub state: ChainState,
    /// Shared context as the last step left it.
    pub context: C,
    /// The error that ended the chain; `None` iff `Completed`.
    pub error: Option<E>,
    /// Per-step results in chain order, skipped steps included.
    pub steps: Vec<StepRecord>,
    /// Total wall-clock time of the run.
    pub elapsed: Duration,
}

impl<C, E: StepError> ChainReport<C, E> {
    /// Returns `true` if every step completed.
    pub fn is_completed(&self) -> bool {
        self.state == ChainState::Completed
    }

    /// Collapse into the context on success or the ending error otherwise.
    pub fn into_result(self) -> Result<C, E> {
        match self.error {
            None => Ok(self.context),
            Some(err) => Err(err),
        }
    }
}

impl<C: fmt::Debug, E: fmt::Debug> fmt::Debug for ChainReport<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainReport")
            .field("chain", &self.chain)
            .field("state", &self.state)
            .field("context", &self.context)
            .field("error", &self.error)
            .field("steps", &self.steps)
            .field("elapsed", &self.elapsed)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// OperationChain
// ---------------------------------------------------------------------------

struct WeightedStep<C, E> {
    weight: u64,
    step: Box<dyn ChainStep<C, E>>,
}

/// A named, ordered sequence of async steps sharing one mutable context.
///
/// `run` consumes the chain, so a chain instance can never be restarted;
/// build a new one to retry.
pub struct OperationChain<C, E> {
    name: String,
    steps: Vec<WeightedStep<C, E>>,
    state: watch::Sender<ChainState>,
    progress: ProgressSink,
}

impl<C: Send, E: StepError> OperationChain<C, E> {
    /// Create an empty chain.
    pub fn new(name: impl Into<String>) -> Self {
        let (state, _) = watch::channel(ChainState::Built);
        Self {
            name: name.into(),
            steps: Vec::new(),
            state,
            progress: ProgressSink::new(),
        }
    }

    /// Append a step with weight 1.
    pub fn step(self, step: impl ChainStep<C, E> + 'static) -> Self {
        self.weighted_step(1, step)
    }

    /// Append a step owning `weight` shares of the chain's progress.
    pub fn weighted_step(mut self, weight: u64, step: impl ChainStep<C, E> + 'static) -> Self {
        self.push(weight, Box::new(step));
        self
    }

    /// Append a boxed step.
    pub fn push(&mut self, weight: u64, step: Box<dyn ChainStep<C, E>>) {
        self.steps.push(WeightedStep { weight, step });
    }

    /// Deliver aggregate progress to an existing sink (and its subscribers).
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = sink;
        self
    }

    /// Subscribe to aggregate progress.
    pub fn on_progress(&self, callback: impl Fn(Progress) + Send + Sync + 'static) {
        self.progress.subscribe(callback);
    }

    /// Observe state transitions of this chain.
    pub fn state_watch(&self) -> watch::Receiver<ChainState> {
        self.state.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> ChainState {
        *self.state.borrow()
    }

    /// The chain's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if the chain has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order against `context`.
    ///
    /// The run ends at the first failing step (`Failed`), at the first step
    /// that honors cancellation (`Cancelled`), or after the last step
    /// (`Completed`). Steps after the ending one never run.
    pub async fn run(self, mut context: C, cancel: CancellationToken) -> ChainReport<C, E> {
        let started = Instant::now();
        self.state.send_replace(ChainState::Running);
        debug!(chain = %self.name, steps = self.steps.len(), "chain started");

        let tracker = Arc::new(ProgressTracker::new(
            self.steps.iter().map(|s| s.weight).collect(),
            self.progress.clone(),
        ));
        tracker.start();

        let mut records = Vec::with_capacity(self.steps.len());
        let mut ending: Option<(ChainState, E)> = None;

        for (index, entry) in self.steps.iter().enumerate() {
            let step_name = entry.step.name().to_string();

            if ending.is_some() {
                records.push(StepRecord {
                    name: step_name,
                    outcome: StepOutcome::Skipped,
                    elapsed: Duration::ZERO,
                });
                continue;
            }

            if cancel.is_cancelled() {
                info!(chain = %self.name, step = %step_name, "chain cancelled before step");
                records.push(StepRecord {
                    name: step_name,
                    outcome: StepOutcome::Skipped,
                    elapsed: Duration::ZERO,
                });
                ending = Some((ChainState::Cancelled, E::cancelled()));
                continue;
            }

            let step_ctx = StepContext::new(
                index,
                step_name.clone(),
                cancel.child_token(),
                Arc::clone(&tracker),
            );
            let step_start = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(E::cancelled()),
                r = entry.step.run(&mut context, &step_ctx) => r,
            };
            let elapsed = step_start.elapsed();

            match result {
                Ok(()) => {
                    tracker.complete_step(index);
                    debug!(chain = %self.name, step = %step_name, ?elapsed, "step completed");
                    records.push(StepRecord {
                        name: step_name,
                        outcome: StepOutcome::Completed,
                        elapsed,
                    });
                }
                Err(err) if err.is_cancelled() => {
                    info!(chain = %self.name, step = %step_name, "step cancelled");
                    records.push(StepRecord {
                        name: step_name,
                        outcome: StepOutcome::Cancelled,
                        elapsed,
                    });
                    ending = Some((ChainState::Cancelled, err));
                }
                Err(err) => {
                    debug!(chain = %self.name, step = %step_name, error = %err, "step failed");
                    records.push(StepRecord {
                        name: step_name,
                        outcome: StepOutcome::Failed {
                            reason: err.to_string(),
                        },
                        elapsed,
                    });
                    ending = Some((ChainState::Failed, err));
                }
            }
        }

        let (state, error) = match ending {
            Some((state, err)) => (state, Some(err)),
            None => {
                tracker.finish();
                (ChainState::Completed, None)
            }
        };
        self.state.send_replace(state);
        let elapsed = started.elapsed();
        debug!(chain = %self.name, %state, ?elapsed, "chain finished");

        ChainReport {
            chain: self.name,
            state,
            context,
            error,
            steps: records,
            elapsed,
        }
    }
}

impl<C, E> fmt::Debug for OperationChain<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.steps.iter().map(|s| s.step.name()).collect();
        f.debug_struct("OperationChain")
            .field("name", &self.name)
            .field("steps", &names)
            .field("state", &*self.state.borrow())
            .finish()
    }
}
