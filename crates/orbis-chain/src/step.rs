use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::progress::ProgressTracker;

// ---------------------------------------------------------------------------
// ChainStep trait
// ---------------------------------------------------------------------------

/// A single async step of an [`OperationChain`](crate::OperationChain).
///
/// Steps run strictly in order. Each receives the chain's shared context and
/// a [`StepContext`] for progress and cancellation. A step that suspends
/// should call [`StepContext::checkpoint`] around its suspension points; the
/// engine additionally races every step against the chain's cancellation
/// token, so a step parked on I/O is dropped as soon as cancellation lands.
#[async_trait]
pub trait ChainStep<C, E>: Send + Sync {
    /// Name used in logs and [`StepRecord`]s.
    fn name(&self) -> &str;

    /// Run the step against the shared context.
    async fn run(&self, ctx: &mut C, step: &StepContext) -> Result<(), E>;
}

// ---------------------------------------------------------------------------
// StepContext
// ---------------------------------------------------------------------------

/// Per-step handle to progress reporting and cancellation.
pub struct StepContext {
    index: usize,
    name: String,
    cancel: CancellationToken,
    tracker: Arc<ProgressTracker>,
}

impl StepContext {
    pub(crate) fn new(
        index: usize,
        name: impl Into<String>,
        cancel: CancellationToken,
        tracker: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            cancel,
            tracker,
        }
    }

    /// Position of this step in its chain.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Name of this step.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Report `(done, total)` of this step's own work, typically bytes.
    pub fn report(&self, done: u64, total: u64) {
        self.tracker.step_progress(self.index, done, total);
    }

    /// The token to hand to nested operations.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns `true` if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail with the cancellation error if cancellation was requested.
    pub fn checkpoint<E: StepError>(&self) -> Result<(), E> {
        if self.cancel.is_cancelled() {
            Err(E::cancelled())
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for StepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// StepRecord
// ---------------------------------------------------------------------------

/// How a step ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    Failed { reason: String },
    Cancelled,
    /// Never started because an earlier step ended the chain.
    Skipped,
}

/// Recorded result of one step in a finished chain run.
#[derive(Clone, Debug)]
pub struct StepRecord {
    /// Name of the step.
    pub name: String,
    /// How the step ended.
    pub outcome: StepOutcome,
    /// Wall-clock time the step ran (zero when skipped).
    pub elapsed: Duration,
}

impl StepRecord {
    /// Returns `true` if the step ran to completion.
    pub fn completed(&self) -> bool {
        self.outcome == StepOutcome::Completed
    }
}
