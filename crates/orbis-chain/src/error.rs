/// Error type a chain step may fail with.
///
/// The engine needs two things from it: a way to produce the error a
/// cancelled step ends with, and a way to tell that error apart from real
/// failures so the chain can settle as `Cancelled` rather than `Failed`.
pub trait StepError: std::error::Error + Send + Sync + 'static {
    /// The error a step ends with when it honors cancellation.
    fn cancelled() -> Self;

    /// Returns `true` if this error is the cancellation error.
    fn is_cancelled(&self) -> bool;

    /// The error a resource settles with when its fetch task panicked.
    fn panicked(message: String) -> Self;
}

/// General-purpose step error for chains that need no richer taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// A step failed.
    #[error("step error in '{step}': {message}")]
    Step { step: String, message: String },

    /// The chain honored a cancellation request.
    #[error("operation cancelled")]
    Cancelled,

    /// The task running the operation panicked.
    #[error("operation panicked: {0}")]
    Panicked(String),
}

impl ChainError {
    /// Create a step error with a name and message.
    pub fn step(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Step {
            step: step.into(),
            message: message.into(),
        }
    }
}

impl StepError for ChainError {
    fn cancelled() -> Self {
        Self::Cancelled
    }

    fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    fn panicked(message: String) -> Self {
        Self::Panicked(message)
    }
}
