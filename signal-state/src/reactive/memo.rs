//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a dependency changes, the runtime marks the memo dirty.
//!
//! 4. On next access, the memo recomputes and re-tracks its dependencies.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually accessed will recompute
//! - Memos that are never read stay dirty (no wasted work)
//!
//! # Thread Safety
//!
//! Memos are thread-safe. No lock is held while the computation runs, so a
//! computation may freely read other memos and signals.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::context::ReactiveContext;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::signal::Readable;
use crate::graph::NodeId;

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// The memo needs to recompute before its next read.
    Dirty,
}

struct MemoInner<T> {
    id: NodeId,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    value: RwLock<Option<T>>,
    state: Mutex<MemoState>,
    recomputations: Mutex<usize>,
}

impl<T> MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        if *self.state.lock() == MemoState::Clean {
            if let Some(value) = self.value.read().as_ref() {
                return value.clone();
            }
        }
        self.recompute()
    }

    /// Run the computation within a read-only context to re-track
    /// dependencies.
    fn recompute(&self) -> T {
        Runtime::clear_dependencies(self.id);

        // Clean before computing: a change that lands mid-computation
        // dirties the memo again.
        *self.state.lock() = MemoState::Clean;

        let new_value = {
            let _ctx = ReactiveContext::enter(self.id, false);
            (self.compute)()
        };

        *self.value.write() = Some(new_value.clone());
        *self.recomputations.lock() += 1;

        new_value
    }
}

impl<T> Reactive for MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn mark_dirty(&self) {
        *self.state.lock() = MemoState::Dirty;
    }

    fn run(&self) {}

    fn is_eager(&self) -> bool {
        false
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// Clones share the cache and graph node. The memo is unregistered from the
/// runtime once its last clone is dropped.
pub struct Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<MemoInner<T>>,
    _handle: Arc<ReactiveHandle>,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new(MemoInner {
            id: NodeId::new(),
            compute: Box::new(compute),
            value: RwLock::new(None),
            state: Mutex::new(MemoState::Dirty),
            recomputations: Mutex::new(0),
        });
        let as_reactive: Arc<dyn Reactive> = inner.clone();
        let handle = Runtime::register(&as_reactive);

        Self {
            inner,
            _handle: Arc::new(handle),
        }
    }

    /// Get the memo's graph node.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// Inside a reactive context this also makes the running computation
    /// depend on the memo.
    pub fn get(&self) -> T {
        Runtime::track_read(self.inner.id);
        self.inner.get()
    }

    /// Get the current value without tracking the memo as a dependency.
    ///
    /// The computation itself still tracks its own inputs.
    pub fn get_untracked(&self) -> T {
        self.inner.get()
    }

    /// Force the memo to recompute on next access.
    pub fn mark_dirty(&self) {
        self.inner.mark_dirty();
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        *self.inner.state.lock()
    }

    /// How many times the computation has run.
    pub fn recomputations(&self) -> usize {
        *self.inner.recomputations.lock()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }
}

impl<T> Readable<T> for Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Memo::get(self)
    }

    fn get_untracked(&self) -> T {
        Memo::get_untracked(self)
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _handle: Arc::clone(&self._handle),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
