use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{ResolveError, ResolveResult};

/// Run `op` unless or until `cancel` fires.
///
/// Cancellation wins ties, and an already-cancelled token never starts the
/// remote request.
pub async fn cancellable<T, F>(cancel: &CancellationToken, op: F) -> ResolveResult<T>
where
    F: Future<Output = ResolveResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(ResolveError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ResolveError::Cancelled),
        result = op => result,
    }
}
