use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::StepError;
use crate::progress::{Progress, ProgressSink};

/// Boxed future produced by a [`LazyResource`]'s fetch closure.
pub type FetchFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'static>>;

type FetchFn<T, E> = Box<dyn FnOnce(ProgressSink, CancellationToken) -> FetchFuture<T, E> + Send>;

/// Lifecycle of a [`LazyResource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LazyState {
    Unstarted,
    Pending,
    Ready,
    Failed,
}

impl LazyState {
    /// Returns `true` for `Ready` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

struct Inner<T, E> {
    name: String,
    started: AtomicBool,
    fetch: Mutex<Option<FetchFn<T, E>>>,
    result: OnceLock<Result<T, E>>,
    state: watch::Sender<LazyState>,
    progress: ProgressSink,
    cancel: CancellationToken,
}

/// A memoized, lazily started async value.
///
/// The fetch closure runs at most once per resource, no matter how many
/// observers arrive or how concurrently: the `Unstarted -> Pending`
/// transition is a compare-and-set, and only its winner spawns the fetch.
/// Every observer then sees the same settled result. A settled resource
/// never re-runs; build a new one to retry.
///
/// The fetch runs as its own Tokio task, so it keeps going if the observer
/// that started it stops waiting. A fetch task that panics settles the
/// resource as failed with [`StepError::panicked`]. Cloning a
/// `LazyResource` shares it.
pub struct LazyResource<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for LazyResource<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> LazyResource<T, E>
where
    T: Send + Sync + 'static,
    E: StepError,
{
    /// Create an unstarted resource with its own cancellation token.
    pub fn new<F, Fut>(name: impl Into<String>, fetch: F) -> Self
    where
        F: FnOnce(ProgressSink, CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::with_token(name, CancellationToken::new(), fetch)
    }

    /// Create an unstarted resource whose fetch observes `cancel`.
    pub fn with_token<F, Fut>(name: impl Into<String>, cancel: CancellationToken, fetch: F) -> Self
    where
        F: FnOnce(ProgressSink, CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let boxed: FetchFn<T, E> =
            Box::new(move |sink, token| -> FetchFuture<T, E> { Box::pin(fetch(sink, token)) });
        let (state, _) = watch::channel(LazyState::Unstarted);
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                started: AtomicBool::new(false),
                fetch: Mutex::new(Some(boxed)),
                result: OnceLock::new(),
                state,
                progress: ProgressSink::new(),
                cancel,
            }),
        }
    }

    /// Start the fetch if nobody has yet. Returns `true` for the caller that
    /// started it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn trigger(&self) -> bool {
        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let fetch = self.inner.fetch.lock().expect("lazy lock poisoned").take();
        let Some(fetch) = fetch else {
            return false;
        };

        self.inner.state.send_replace(LazyState::Pending);
        debug!(resource = %self.inner.name, "lazy resource started");

        let future = fetch(self.inner.progress.clone(), self.inner.cancel.clone());
        let task = tokio::spawn(future);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = match task.await {
                Ok(result) => result,
                Err(err) => {
                    warn!(resource = %inner.name, error = %err, "lazy resource fetch aborted");
                    Err(E::panicked(err.to_string()))
                }
            };
            let state = if result.is_ok() {
                LazyState::Ready
            } else {
                LazyState::Failed
            };
            // Only the single spawned task ever sets the cell.
            let _ = inner.result.set(result);
            inner.state.send_replace(state);
            debug!(resource = %inner.name, ?state, "lazy resource settled");
        });
        true
    }

    /// Start the fetch if needed and suspend until it settles.
    ///
    /// Safe to call from any number of tasks at once; all resume once the
    /// single underlying fetch finishes.
    pub async fn await_ready(&self) {
        self.trigger();
        let mut states = self.inner.state.subscribe();
        // The sender lives in `inner`, which we hold, so the channel cannot close.
        let _ = states.wait_for(LazyState::is_terminal).await;
    }

    /// Start the fetch if needed, wait, and return the settled result.
    pub async fn get(&self) -> Result<&T, &E> {
        self.await_ready().await;
        self.value()
    }

    /// Returns `true` once the resource has settled. Never blocks.
    pub fn is_ready(&self) -> bool {
        self.inner.result.get().is_some()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LazyState {
        *self.inner.state.borrow()
    }

    /// The settled result.
    ///
    /// # Panics
    ///
    /// Panics if called before the resource settled. Call
    /// [`await_ready`](Self::await_ready) first, or use
    /// [`try_value`](Self::try_value).
    pub fn value(&self) -> Result<&T, &E> {
        match self.inner.result.get() {
            Some(result) => result.as_ref(),
            None => panic!(
                "lazy resource '{}' read before it settled; await_ready() first",
                self.inner.name
            ),
        }
    }

    /// The settled result, or `None` while unstarted or pending.
    pub fn try_value(&self) -> Option<Result<&T, &E>> {
        self.inner.result.get().map(Result::as_ref)
    }

    /// Subscribe to progress of the underlying fetch. May be called before
    /// the fetch starts.
    pub fn on_progress(&self, callback: impl Fn(Progress) + Send + Sync + 'static) {
        self.inner.progress.subscribe(callback);
    }

    /// Request cancellation of the underlying fetch.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// The resource's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

impl<T, E> fmt::Debug for LazyResource<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyResource")
            .field("name", &self.inner.name)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ChainError, StepError};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting(
        calls: Arc<AtomicUsize>,
        delay: Duration,
    ) -> LazyResource<String, ChainError> {
        LazyResource::new("counting", move |sink, _cancel| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            sink.emit(Progress::new(1, 2));
            tokio::time::sleep(delay).await;
            sink.emit(Progress::new(2, 2));
            Ok("value".to_string())
        })
    }

    #[tokio::test]
    async fn starts_unstarted_and_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let res = counting(Arc::clone(&calls), Duration::ZERO);
        tokio::task::yield_now().await;
        assert_eq!(res.state(), LazyState::Unstarted);
        assert!(!res.is_ready());
        assert!(res.try_value().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn value_is_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let res = counting(Arc::clone(&calls), Duration::ZERO);
        res.await_ready().await;
        assert!(res.is_ready());
        assert_eq!(res.state(), LazyState::Ready);
        let first = res.value().unwrap() as *const String;
        let second = res.value().unwrap() as *const String;
        assert_eq!(first, second);
        assert_eq!(res.value().unwrap(), "value");

        res.await_ready().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_observers_share_one_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let res = counting(Arc::clone(&calls), Duration::from_millis(20));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let r = res.clone();
            handles.push(tokio::spawn(async move {
                r.await_ready().await;
                r.value().map(|v| v.clone()).map_err(|e| e.clone())
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), "value");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn only_first_trigger_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let res = counting(Arc::clone(&calls), Duration::ZERO);
        assert!(res.trigger());
        assert!(!res.trigger());
        res.await_ready().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_terminal_and_preserved() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let res: LazyResource<u32, ChainError> = LazyResource::new("failing", move |_, _| async move {
            c.fetch_add(1, Ordering::SeqCst);
            Err(ChainError::step("fetch", "unreachable"))
        });
        let err = res.get().await.unwrap_err().clone();
        assert_eq!(err, ChainError::step("fetch", "unreachable"));
        assert_eq!(res.state(), LazyState::Failed);

        res.await_ready().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    #[should_panic(expected = "read before it settled")]
    async fn value_before_ready_panics() {
        let res = counting(Arc::new(AtomicUsize::new(0)), Duration::ZERO);
        let _ = res.value();
    }

    #[tokio::test]
    async fn progress_subscribed_before_trigger() {
        let res = counting(Arc::new(AtomicUsize::new(0)), Duration::ZERO);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&seen);
        res.on_progress(move |p| out.lock().unwrap().push(p));
        res.await_ready().await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Progress::new(1, 2), Progress::new(2, 2)]
        );
    }

    #[tokio::test]
    async fn panicking_fetch_settles_failed() {
        let explode = true;
        let res: LazyResource<u32, ChainError> = LazyResource::new("exploding", move |_, _| async move {
            if explode {
                panic!("fetch bug");
            }
            Ok(1)
        });
        tokio::time::timeout(Duration::from_secs(2), res.await_ready())
            .await
            .expect("resource never settled");
        assert_eq!(res.state(), LazyState::Failed);
        assert!(matches!(res.value().unwrap_err(), ChainError::Panicked(_)));
    }

    #[tokio::test]
    async fn panicking_subscriber_settles_failed() {
        let res = counting(Arc::new(AtomicUsize::new(0)), Duration::ZERO);
        res.on_progress(|_| panic!("subscriber bug"));
        tokio::time::timeout(Duration::from_secs(2), res.await_ready())
            .await
            .expect("resource never settled");
        assert_eq!(res.state(), LazyState::Failed);
        let err = res.value().unwrap_err();
        assert!(!err.is_cancelled());
        assert!(err.to_string().contains("panicked"), "{err}");
    }

    #[tokio::test]
    async fn cancel_settles_failed() {
        let res: LazyResource<(), ChainError> = LazyResource::new("parked", |_, cancel| async move {
            cancel.cancelled().await;
            Err(ChainError::cancelled())
        });
        res.trigger();
        res.cancel();
        res.await_ready().await;
        assert!(res.value().unwrap_err().is_cancelled());
    }
}
