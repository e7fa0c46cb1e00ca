//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    runtime records the running computation as a dependent.
//!
//! 2. When a signal's value changes, the runtime propagates the change to
//!    every dependent.
//!
//! 3. Writes are rejected while a read-only computation is running.
//!
//! # Thread Safety
//!
//! Signals are thread-safe. The value is protected by a `RwLock` that is
//! released before any dependent is notified.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::error::ReactiveError;
use super::runtime::{ReactiveHandle, Runtime};
use crate::graph::NodeId;

/// Anything that exposes a current value and notifies readers on change.
///
/// Implemented by [`Signal`], [`ReadSignal`] and [`Memo`](super::Memo).
pub trait Readable<T>: Send + Sync + 'static {
    /// Read the value, tracking it as a dependency of the running computation.
    fn get(&self) -> T;

    /// Read the value without tracking.
    fn get_untracked(&self) -> T;
}

struct SignalInner<T> {
    handle: ReactiveHandle,
    value: RwLock<T>,
}

/// A reactive signal holding a value of type T.
///
/// Clones share the same value and graph node.
///
/// # Writes
///
/// [`Signal::set`] and [`Signal::update`] panic when called from a memo or
/// from an effect without write access. Code that may run inside a
/// computation should use [`Signal::try_set`] / [`Signal::try_update`],
/// which return [`ReactiveError::WriteInComputation`] instead.
///
/// # Example
///
/// ```rust
/// use signal_state::reactive::{Memo, ReactiveError, Signal};
///
/// let count = Signal::new(0);
/// count.try_set(5)?;
/// assert_eq!(count.get(), 5);
///
/// // Memos may not write
/// let target = count.clone();
/// let attempt = Memo::new(move || target.try_set(6).is_err());
/// assert!(attempt.get());
/// assert_eq!(count.get(), 5);
/// # Ok::<(), ReactiveError>(())
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                handle: Runtime::register_source(NodeId::new()),
                value: RwLock::new(value),
            }),
        }
    }

    /// Get the signal's graph node.
    pub fn id(&self) -> NodeId {
        self.inner.handle.node_id()
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a dependent.
    pub fn get(&self) -> T {
        Runtime::track_read(self.id());
        self.inner.value.read().clone()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Borrow the value for the duration of `f`, with tracking.
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        Runtime::track_read(self.id());
        f(&self.inner.value.read())
    }

    /// Set a new value and notify dependents.
    ///
    /// # Panics
    ///
    /// Panics when called from a computation that may not write; see
    /// [`Signal::try_set`].
    pub fn set(&self, value: T) {
        if let Err(err) = self.try_set(value) {
            panic!("{err}");
        }
    }

    /// Set a new value and notify dependents, failing inside read-only
    /// computations.
    pub fn try_set(&self, value: T) -> Result<(), ReactiveError> {
        self.check_writable()?;
        *self.inner.value.write() = value;
        Runtime::notify_change(self.id());
        Ok(())
    }

    /// Update the value using a function.
    ///
    /// # Panics
    ///
    /// Same as [`Signal::set`].
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        if let Err(err) = self.try_update(f) {
            panic!("{err}");
        }
    }

    /// Update the value using a function, failing inside read-only
    /// computations.
    pub fn try_update(&self, f: impl FnOnce(&T) -> T) -> Result<(), ReactiveError> {
        self.check_writable()?;
        {
            let mut guard = self.inner.value.write();
            let next = f(&guard);
            *guard = next;
        }
        Runtime::notify_change(self.id());
        Ok(())
    }

    /// A read-only handle to this signal's value.
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            signal: self.clone(),
        }
    }

    fn check_writable(&self) -> Result<(), ReactiveError> {
        if ReactiveContext::writes_allowed() {
            Ok(())
        } else {
            Err(ReactiveError::WriteInComputation { signal: self.id() })
        }
    }
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Set a new value only if it differs from the current one.
    ///
    /// Returns whether the value changed. Equal values notify nobody.
    pub fn try_set_if_changed(&self, value: T) -> Result<bool, ReactiveError> {
        self.check_writable()?;
        {
            let mut guard = self.inner.value.write();
            if *guard == value {
                return Ok(false);
            }
            *guard = value;
        }
        Runtime::notify_change(self.id());
        Ok(true)
    }
}

impl<T> Readable<T> for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Signal::get(self)
    }

    fn get_untracked(&self) -> T {
        Signal::get_untracked(self)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &self.get_untracked())
            .finish()
    }
}

/// Read-only view of a [`Signal`].
///
/// Reads always see the signal's latest value; there is no way to write
/// through it.
pub struct ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    signal: Signal<T>,
}

impl<T> ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn id(&self) -> NodeId {
        self.signal.id()
    }

    pub fn get(&self) -> T {
        self.signal.get()
    }

    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }

    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        self.signal.with(f)
    }
}

impl<T> Readable<T> for ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        ReadSignal::get(self)
    }

    fn get_untracked(&self) -> T {
        ReadSignal::get_untracked(self)
    }
}

impl<T> Clone for ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T> Debug for ReadSignal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadSignal")
            .field("id", &self.id())
            .field("value", &self.get_untracked())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
