use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

/// Number of work units chain-level progress is expressed in.
pub const PROGRESS_RESOLUTION: u64 = 1_000_000;

/// A `(done, total)` progress figure. `done` never exceeds `total`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub done: u64,
    pub total: u64,
}

impl Progress {
    /// Create a figure, clamping `done` to `total`.
    pub fn new(done: u64, total: u64) -> Self {
        Self {
            done: done.min(total),
            total,
        }
    }

    /// Completed share in `0.0..=1.0`. Zero-sized work counts as not started.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.done as f64 / self.total as f64
        }
    }

    /// Returns `true` once all work is done.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.done == self.total
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({:.1}%)", self.done, self.total, self.fraction() * 100.0)
    }
}

/// Progress subscriber.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Fan-out of progress figures to any number of subscribers.
///
/// Cloning shares the subscriber list, so a sink handed to a running
/// operation keeps delivering to callbacks registered later.
#[derive(Clone, Default)]
pub struct ProgressSink {
    subscribers: Arc<RwLock<Vec<ProgressCallback>>>,
}

impl ProgressSink {
    /// Create a sink with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback.
    pub fn subscribe(&self, callback: impl Fn(Progress) + Send + Sync + 'static) {
        self.subscribers
            .write()
            .expect("progress lock poisoned")
            .push(Arc::new(callback));
    }

    /// Deliver a figure to every subscriber.
    pub fn emit(&self, progress: Progress) {
        // Snapshot so callbacks may subscribe without deadlocking.
        let subscribers = self
            .subscribers
            .read()
            .expect("progress lock poisoned")
            .clone();
        for callback in subscribers {
            callback(progress);
        }
    }

    /// Number of registered callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("progress lock poisoned").len()
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Aggregates per-step progress into one chain-level figure.
///
/// Each step owns `weight / total_weight` of [`PROGRESS_RESOLUTION`]. Emitted
/// figures never decrease and never exceed the total.
pub(crate) struct ProgressTracker {
    weights: Vec<u64>,
    total_weight: u64,
    sink: ProgressSink,
    state: Mutex<TrackerState>,
}

#[derive(Default)]
struct TrackerState {
    completed_weight: u64,
    last_done: u64,
}

impl ProgressTracker {
    /// Zero weights everywhere fall back to equal weighting.
    pub(crate) fn new(weights: Vec<u64>, sink: ProgressSink) -> Self {
        let weights = if weights.iter().all(|w| *w == 0) {
            vec![1; weights.len()]
        } else {
            weights
        };
        let total_weight = weights.iter().sum();
        Self {
            weights,
            total_weight,
            sink,
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub(crate) fn start(&self) {
        self.sink.emit(Progress::new(0, PROGRESS_RESOLUTION));
    }

    /// A step reported `(done, total)` of its own work.
    pub(crate) fn step_progress(&self, index: usize, done: u64, total: u64) {
        if self.total_weight == 0 || total == 0 {
            return;
        }
        let weight = self.weights.get(index).copied().unwrap_or(0) as u128;
        let total = total as u128;
        let done = (done as u128).min(total);
        let mut state = self.state.lock().expect("tracker lock poisoned");
        let numerator =
            (state.completed_weight as u128 * total + weight * done) * PROGRESS_RESOLUTION as u128;
        let units = numerator / (self.total_weight as u128 * total);
        self.advance(&mut state, units.min(PROGRESS_RESOLUTION as u128) as u64);
    }

    /// A step finished; its whole share counts as done.
    pub(crate) fn complete_step(&self, index: usize) {
        if self.total_weight == 0 {
            return;
        }
        let weight = self.weights.get(index).copied().unwrap_or(0);
        let mut state = self.state.lock().expect("tracker lock poisoned");
        state.completed_weight += weight;
        let units = state.completed_weight as u128 * PROGRESS_RESOLUTION as u128
            / self.total_weight as u128;
        self.advance(&mut state, units.min(PROGRESS_RESOLUTION as u128) as u64);
    }

    /// The chain completed: report the full total.
    pub(crate) fn finish(&self) {
        let mut state = self.state.lock().expect("tracker lock poisoned");
        self.advance(&mut state, PROGRESS_RESOLUTION);
    }

    fn advance(&self, state: &mut TrackerState, units: u64) {
        if units > state.last_done {
            state.last_done = units;
            self.sink.emit(Progress::new(units, PROGRESS_RESOLUTION));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<Progress>>>) {
        let sink = ProgressSink::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&seen);
        sink.subscribe(move |p| out.lock().unwrap().push(p));
        (sink, seen)
    }

    #[test]
    fn progress_clamps_done() {
        let p = Progress::new(15, 10);
        assert_eq!(p.done, 10);
        assert!(p.is_complete());
        assert_eq!(Progress::new(0, 0).fraction(), 0.0);
    }

    #[test]
    fn sink_fans_out() {
        let (sink, seen) = recording_sink();
        let other = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&other);
        sink.subscribe(move |_| *counter.lock().unwrap() += 1);

        sink.emit(Progress::new(1, 2));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(*other.lock().unwrap(), 1);
        assert_eq!(sink.subscriber_count(), 2);
    }

    #[test]
    fn weighted_steps_scale_progress() {
        let (sink, seen) = recording_sink();
        let tracker = ProgressTracker::new(vec![1, 3], sink);
        tracker.complete_step(0);
        tracker.step_progress(1, 50, 100);
        tracker.complete_step(1);
        let done: Vec<u64> = seen.lock().unwrap().iter().map(|p| p.done).collect();
        assert_eq!(done, vec![250_000, 625_000, 1_000_000]);
    }

    #[test]
    fn regressions_are_not_emitted() {
        let (sink, seen) = recording_sink();
        let tracker = ProgressTracker::new(vec![1], sink);
        tracker.step_progress(0, 80, 100);
        tracker.step_progress(0, 20, 100);
        tracker.step_progress(0, 90, 100);
        let done: Vec<u64> = seen.lock().unwrap().iter().map(|p| p.done).collect();
        assert_eq!(done, vec![800_000, 900_000]);
    }

    #[test]
    fn zero_weights_fall_back_to_equal() {
        let (sink, seen) = recording_sink();
        let tracker = ProgressTracker::new(vec![0, 0], sink);
        tracker.complete_step(0);
        assert_eq!(seen.lock().unwrap()[0].done, 500_000);
    }

    #[test]
    fn overshooting_step_is_clamped() {
        let (sink, seen) = recording_sink();
        let tracker = ProgressTracker::new(vec![1, 1], sink);
        tracker.step_progress(0, 500, 100);
        assert_eq!(seen.lock().unwrap()[0].done, 500_000);
    }
}
