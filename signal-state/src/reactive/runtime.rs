//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns the dependency graph and propagates changes.
//!
//! # How It Works
//!
//! 1. Every signal, memo and effect gets a node in the dependency graph.
//!    Memos and effects are additionally registered as [`Reactive`] values.
//!
//! 2. When a memo or effect reads a signal (or another memo), the runtime
//!    records an edge from the value read to the running computation.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Collects every downstream node in topological order
//!    b. Marks them dirty (memos recompute lazily on next read)
//!    c. Runs the effects among them, in order, with no lock held
//!
//! # Thread Safety
//!
//! The registry and graph are process-wide and lock-protected, while the
//! tracking context is thread-local. Values can be shared across threads;
//! the lock is never held while user code runs.

use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;

use super::context::ReactiveContext;
use crate::graph::{NodeId, NodeKind, UpdateScheduler};

/// A trait for computations that can be notified when dependencies change.
pub trait Reactive: Send + Sync {
    /// The graph node of this computation.
    fn node_id(&self) -> NodeId;

    /// Mark this computation as needing to re-run.
    fn mark_dirty(&self);

    /// Re-run this computation (effects only).
    fn run(&self);

    /// Whether this computation runs eagerly (effect) or lazily (memo).
    fn is_eager(&self) -> bool;
}

/// Handle to a node registered with the runtime.
///
/// Dropping this handle removes the node and all its edges.
#[derive(Debug)]
pub struct ReactiveHandle {
    node_id: NodeId,
}

impl ReactiveHandle {
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.node_id);
    }
}

/// The global reactive runtime.
pub struct Runtime;

// Weak references so that the registry never keeps a computation alive.
static REGISTRY: OnceLock<DashMap<NodeId, Weak<dyn Reactive>>> = OnceLock::new();
static GRAPH: OnceLock<Mutex<UpdateScheduler>> = OnceLock::new();

fn registry() -> &'static DashMap<NodeId, Weak<dyn Reactive>> {
    REGISTRY.get_or_init(DashMap::new)
}

fn graph() -> &'static Mutex<UpdateScheduler> {
    GRAPH.get_or_init(|| Mutex::new(UpdateScheduler::new()))
}

impl Runtime {
    /// Add a source node (signal) to the graph.
    pub fn register_source(node_id: NodeId) -> ReactiveHandle {
        graph().lock().add_node(node_id, NodeKind::Source);
        ReactiveHandle { node_id }
    }

    /// Register a memo or effect with the runtime.
    ///
    /// Returns a handle that unregisters the computation when dropped.
    pub fn register(reactive: &Arc<dyn Reactive>) -> ReactiveHandle {
        let node_id = reactive.node_id();
        let kind = if reactive.is_eager() {
            NodeKind::Effect
        } else {
            NodeKind::Derived
        };

        graph().lock().add_node(node_id, kind);
        registry().insert(node_id, Arc::downgrade(reactive));

        ReactiveHandle { node_id }
    }

    fn unregister(node_id: NodeId) {
        registry().remove(&node_id);
        graph().lock().remove_node(node_id);
    }

    /// Record a read of `node_id` by whatever computation is running.
    pub fn track_read(node_id: NodeId) {
        if let Some(subscriber) = ReactiveContext::track_dependency(node_id) {
            graph().lock().add_edge(node_id, subscriber);
        }
    }

    /// Forget the inputs of a computation before it re-runs.
    pub fn clear_dependencies(node_id: NodeId) {
        graph().lock().clear_dependencies(node_id);
    }

    /// Propagate a change of `node_id` to everything downstream of it.
    pub fn notify_change(node_id: NodeId) {
        let order = graph().lock().affected(node_id);
        if order.is_empty() {
            return;
        }

        let reactives: Vec<Arc<dyn Reactive>> = order
            .into_iter()
            .filter_map(|id| registry().get(&id).and_then(|weak| weak.upgrade()))
            .collect();

        // Dirty everything first so effects never observe a stale memo
        for reactive in &reactives {
            reactive.mark_dirty();
        }

        for reactive in reactives.iter().filter(|r| r.is_eager()) {
            reactive.run();
        }
    }

    /// Whether a memo or effect with this id is currently registered.
    pub fn is_registered(node_id: NodeId) -> bool {
        registry().contains_key(&node_id)
    }

    /// Direct dependents of a node, in subscription order.
    pub fn dependents(node_id: NodeId) -> Vec<NodeId> {
        graph()
            .lock()
            .get_node(node_id)
            .map(|node| node.dependents().iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

    struct MockReactive {
        id: NodeId,
        dirty: AtomicBool,
        runs: AtomicI32,
        eager: bool,
    }

    impl MockReactive {
        fn new(eager: bool) -> Arc<Self> {
            Arc::new(Self {
                id: NodeId::new(),
                dirty: AtomicBool::new(false),
                runs: AtomicI32::new(0),
                eager,
            })
        }
    }

    impl Reactive for MockReactive {
        fn node_id(&self) -> NodeId {
            self.id
        }

        fn mark_dirty(&self) {
            self.dirty.store(true, Ordering::SeqCst);
        }

        fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }

        fn is_eager(&self) -> bool {
            self.eager
        }
    }

    fn track(source: NodeId, subscriber: NodeId) {
        let _ctx = ReactiveContext::enter(subscriber, false);
        Runtime::track_read(source);
    }

    #[test]
    fn runtime_registers_and_unregisters() {
        let reactive = MockReactive::new(false);
        let id = reactive.id;
        let as_dyn: Arc<dyn Reactive> = reactive;

        let handle = Runtime::register(&as_dyn);
        assert!(Runtime::is_registered(id));

        drop(handle);
        assert!(!Runtime::is_registered(id));
    }

    #[test]
    fn runtime_notifies_subscribers() {
        let source = Runtime::register_source(NodeId::new());
        let memo = MockReactive::new(false);
        let effect = MockReactive::new(true);

        let memo_dyn: Arc<dyn Reactive> = memo.clone();
        let effect_dyn: Arc<dyn Reactive> = effect.clone();
        let _memo_handle = Runtime::register(&memo_dyn);
        let _effect_handle = Runtime::register(&effect_dyn);

        track(source.node_id(), memo.id);
        track(memo.id, effect.id);

        Runtime::notify_change(source.node_id());

        // Both are dirtied transitively
        assert!(memo.dirty.load(Ordering::SeqCst));
        assert!(effect.dirty.load(Ordering::SeqCst));

        // Only the effect runs
        assert_eq!(memo.runs.load(Ordering::SeqCst), 0);
        assert_eq!(effect.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn runtime_clears_dependencies() {
        let source = Runtime::register_source(NodeId::new());
        let reactive = MockReactive::new(true);
        let as_dyn: Arc<dyn Reactive> = reactive.clone();
        let _handle = Runtime::register(&as_dyn);

        track(source.node_id(), reactive.id);
        assert_eq!(Runtime::dependents(source.node_id()), vec![reactive.id]);

        Runtime::clear_dependencies(reactive.id);
        assert!(Runtime::dependents(source.node_id()).is_empty());

        Runtime::notify_change(source.node_id());
        assert_eq!(reactive.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn untracked_reads_create_no_edges() {
        let source = Runtime::register_source(NodeId::new());
        let subscriber: Arc<dyn Reactive> = MockReactive::new(true);
        let _handle = Runtime::register(&subscriber);
        let _ctx = ReactiveContext::enter(subscriber.node_id(), false);

        super::super::context::untracked(|| Runtime::track_read(source.node_id()));

        assert!(Runtime::dependents(source.node_id()).is_empty());
    }
}
