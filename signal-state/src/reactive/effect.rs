//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the runtime re-runs the effect.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution.
//!
//! # Writes
//!
//! By default an effect may only read. Effects that synchronize one piece
//! of state into another are created with [`Effect::with_writes`], which
//! lets the function write to signals while it is being tracked.
//!
//! # Re-entrancy
//!
//! If a dependency changes while the effect is already running (on this or
//! another thread), the change is not lost: the running invocation re-runs
//! once more after it finishes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::context::ReactiveContext;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use crate::graph::NodeId;

struct EffectInner {
    id: NodeId,
    run: Box<dyn Fn() + Send + Sync>,
    allow_writes: bool,
    disposed: AtomicBool,
    running: AtomicBool,
    pending: AtomicBool,
    run_count: AtomicUsize,
}

/// Clears the running flag even if the effect function panics.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl EffectInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        if self.running.swap(true, Ordering::SeqCst) {
            self.pending.store(true, Ordering::SeqCst);
            return;
        }
        let _running = RunningGuard(&self.running);

        loop {
            self.pending.store(false, Ordering::SeqCst);
            Runtime::clear_dependencies(self.id);

            {
                let _ctx = ReactiveContext::enter(self.id, self.allow_writes);
                (self.run)();
            }
            self.run_count.fetch_add(1, Ordering::SeqCst);

            if !self.pending.load(Ordering::SeqCst) || self.disposed.load(Ordering::SeqCst) {
                break;
            }
        }
    }
}

impl Reactive for EffectInner {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn mark_dirty(&self) {}

    fn run(&self) {
        self.execute();
    }

    fn is_eager(&self) -> bool {
        true
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// The effect stays subscribed while any clone of it is alive and it has not
/// been disposed.
///
/// # Example
///
/// ```rust
/// use signal_state::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let source = count.clone();
/// let effect = Effect::new(move || {
///     println!("Count is: {}", source.get());
/// });
///
/// count.set(5); // Prints: "Count is: 5"
/// assert_eq!(effect.run_count(), 2);
/// ```
pub struct Effect {
    inner: Arc<EffectInner>,
    _handle: Arc<ReactiveHandle>,
}

impl Effect {
    /// Create a read-only effect and run it immediately.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::build(run, false);
        effect.execute();
        effect
    }

    /// Create an effect that may write to signals and run it immediately.
    pub fn with_writes<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::build(run, true);
        effect.execute();
        effect
    }

    /// Create a read-only effect without running it.
    ///
    /// It has no dependencies until [`Effect::execute`] is first called.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(run, false)
    }

    fn build<F>(run: F, allow_writes: bool) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new(EffectInner {
            id: NodeId::new(),
            run: Box::new(run),
            allow_writes,
            disposed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });
        let as_reactive: Arc<dyn Reactive> = inner.clone();
        let handle = Runtime::register(&as_reactive);

        Self {
            inner,
            _handle: Arc::new(handle),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Run the effect function now, re-tracking its dependencies.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Stop the effect permanently and drop its subscriptions.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        Runtime::clear_dependencies(self.inner.id);
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Whether the effect may write to signals.
    pub fn allows_writes(&self) -> bool {
        self.inner.allow_writes
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _handle: Arc::clone(&self._handle),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("allows_writes", &self.allows_writes())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{ReactiveError, Signal};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let effect = Effect::new(|| {});
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let effect = Effect::new_lazy(|| {});
        assert_eq!(effect.run_count(), 0);

        effect.execute();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let signal = Signal::new(0);
        let seen = Arc::new(AtomicI32::new(-1));

        let source = signal.clone();
        let sink = seen.clone();
        let effect = Effect::new(move || sink.store(source.get(), Ordering::SeqCst));
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        signal.set(42);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let signal = Signal::new(0);
        let source = signal.clone();
        let effect = Effect::new(move || {
            source.get();
        });

        effect.dispose();
        assert!(effect.is_disposed());

        signal.set(1);
        effect.execute();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn dropped_effect_stops_listening() {
        let signal = Signal::new(0);
        let runs = Arc::new(AtomicI32::new(0));

        let source = signal.clone();
        let counter = runs.clone();
        let effect = Effect::new(move || {
            source.get();
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(effect);

        signal.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn read_only_effect_cannot_write() {
        let target = Signal::new(0);
        let outcome = Arc::new(Mutex::new(None));

        let sink = target.clone();
        let record = outcome.clone();
        let _effect = Effect::new(move || {
            *record.lock() = Some(sink.try_set(1));
        });

        assert_eq!(
            *outcome.lock(),
            Some(Err(ReactiveError::WriteInComputation {
                signal: target.id()
            }))
        );
        assert_eq!(target.get(), 0);
    }

    #[test]
    fn writable_effect_forwards_values() {
        let source = Signal::new(1);
        let target = Signal::new(0);

        let (from, to) = (source.clone(), target.clone());
        let _sync = Effect::with_writes(move || to.set(from.get() * 10));
        assert_eq!(target.get(), 10);

        source.set(2);
        assert_eq!(target.get(), 20);
    }

    #[test]
    fn reentrant_change_reruns_once_more() {
        let signal = Signal::new(0);
        let source = signal.clone();
        let effect = Effect::with_writes(move || {
            // Bump to 3 by writing to the value we depend on
            let value = source.get();
            if value < 3 {
                source.set(value + 1);
            }
        });

        assert_eq!(signal.get(), 3);
        assert_eq!(effect.run_count(), 4);
    }
}
