//! Composable async operation chains and memoized lazy resources.
//!
//! An [`OperationChain`] is a named, ordered list of async steps that share
//! one mutable context. The chain runs its steps strictly in sequence,
//! aggregates their byte-level progress into one monotonic figure, stops at
//! the first failure (keeping the context built so far), and honors
//! cooperative cancellation through a [`CancellationToken`].
//!
//! A [`LazyResource`] memoizes one async fetch: the first observer starts
//! it, every observer sees the same in-flight or settled result, and the
//! fetch runs at most once.
//!
//! # Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use orbis_chain::{CancellationToken, ChainError, ChainState, ChainStep, OperationChain, StepContext};
//!
//! struct Double;
//!
//! #[async_trait]
//! impl ChainStep<u64, ChainError> for Double {
//!     fn name(&self) -> &str {
//!         "double"
//!     }
//!
//!     async fn run(&self, ctx: &mut u64, _step: &StepContext) -> Result<(), ChainError> {
//!         *ctx *= 2;
//!         Ok(())
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let chain = OperationChain::new("math").step(Double).step(Double);
//! let report = chain.run(3, CancellationToken::new()).await;
//! assert_eq!(report.state, ChainState::Completed);
//! assert_eq!(report.context, 12);
//! # });
//! ```

pub mod chain;
pub mod error;
pub mod lazy;
pub mod progress;
pub mod step;

pub use chain::{ChainReport, ChainState, OperationChain};
pub use error::{ChainError, StepError};
pub use lazy::{FetchFuture, LazyResource, LazyState};
pub use progress::{Progress, ProgressCallback, ProgressSink, PROGRESS_RESOLUTION};
pub use step::{ChainStep, StepContext, StepOutcome, StepRecord};
pub use tokio_util::sync::CancellationToken;
