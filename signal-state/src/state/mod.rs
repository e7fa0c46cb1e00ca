//! State Container
//!
//! [`SignalState`] holds a typed record with one reactive cell per field and
//! exposes it through four engines:
//!
//! - the selector engine (`select`, `select_many`, `pick`) hands out
//!   read-only views and handles.
//! - the mutation gateway (`patch`, `set`) is the only write path.
//! - the sync engine (`connect`, `connect_producers`, `trigger`) binds
//!   external sources into fields.
//! - the snapshot accessor (`state`, `snapshot`) reads the whole record.
//!
//! # Lifecycle
//!
//! A container starts uninitialized. [`SignalState::initialize`] builds the
//! cells exactly once; every other operation fails with
//! [`StateError::NotInitialized`] until then, and a second `initialize`
//! fails with [`StateError::AlreadyInitialized`].
//!
//! Bindings created by the sync engine live as long as the container. They
//! are torn down when the last clone of the container is dropped, or
//! earlier by [`SignalState::dispose`].
//!
//! # Example
//!
//! ```rust
//! use signal_state::{field, Field, Fields, Patch, Record, SignalState};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Counter {
//!     count: u32,
//! }
//!
//! impl Counter {
//!     const COUNT: Field<Self, u32> = field!(Counter, count: u32);
//! }
//!
//! impl Record for Counter {
//!     fn fields() -> Fields<Self> {
//!         Fields::new().with(Self::COUNT)
//!     }
//! }
//!
//! let state = SignalState::new();
//! state.initialize(Counter { count: 0 })?;
//!
//! let count = state.select(Counter::COUNT)?;
//! state.patch(Patch::new().set(Counter::COUNT, 5))?;
//!
//! assert_eq!(count.get(), 5);
//! assert_eq!(state.snapshot()?, Counter { count: 5 });
//! # Ok::<(), signal_state::StateError>(())
//! ```

mod error;
mod options;
mod patch;
mod record;
mod registry;
mod select;
mod snapshot;
mod sync;

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

pub use error::StateError;
pub use options::StateOptions;
pub use patch::Patch;
pub use record::{Field, FieldKey, Fields, Record, Value};
pub use select::{Picked, Selection};
pub use sync::{from_future, BoxError, Connections, Producer, ProducerConnections, SyncError};

use crate::reactive::{Owner, Signal};
use registry::CellRegistry;

pub(crate) struct Inner<R> {
    options: StateOptions,
    registry: OnceLock<Arc<CellRegistry<R>>>,
    /// One trigger per field bound to a producer, created on first binding.
    triggers: DashMap<&'static str, Signal<u64>>,
    errors: broadcast::Sender<SyncError>,
    owner: Owner,
}

/// A reactive state container for a record `R`.
///
/// Cheap to clone; clones share the same cells.
pub struct SignalState<R> {
    inner: Arc<Inner<R>>,
}

impl<R: Record> SignalState<R> {
    /// Create an uninitialized container with default options.
    pub fn new() -> Self {
        Self::with_options(StateOptions::default())
    }

    pub fn with_options(options: StateOptions) -> Self {
        let (errors, _) = broadcast::channel(options.error_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                options,
                registry: OnceLock::new(),
                triggers: DashMap::new(),
                errors,
                owner: Owner::new(),
            }),
        }
    }

    pub fn options(&self) -> &StateOptions {
        &self.inner.options
    }

    /// Build one cell per declared field, seeded from `initial`.
    ///
    /// # Errors
    ///
    /// [`StateError::AlreadyInitialized`] on any call after the first
    /// successful one; the existing cells and bindings are kept.
    /// [`StateError::DuplicateField`] if `R` declares a field name twice.
    pub fn initialize(&self, initial: R) -> Result<(), StateError> {
        if self.is_initialized() {
            return Err(StateError::AlreadyInitialized);
        }

        let registry = CellRegistry::build(initial)?;
        let fields = registry.len();
        self.inner
            .registry
            .set(Arc::new(registry))
            .map_err(|_| StateError::AlreadyInitialized)?;

        debug!(state = %self.inner.options.name, fields, "initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.registry.get().is_some()
    }

    /// The cells, or `NotInitialized`. Every operation goes through here.
    pub(crate) fn registry(&self) -> Result<&Arc<CellRegistry<R>>, StateError> {
        self.inner.registry.get().ok_or(StateError::NotInitialized)
    }

    /// Tear down every binding now.
    ///
    /// Pending producer results are dropped and sources are no longer
    /// followed. Cells stay readable and writable through `patch`.
    pub fn dispose(&self) {
        if self.inner.owner.is_disposed() {
            return;
        }
        self.inner.owner.dispose();
        debug!(state = %self.inner.options.name, "disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.owner.is_disposed()
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner<R>> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<Inner<R>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}

impl<R: Record> Default for SignalState<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for SignalState<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> fmt::Debug for SignalState<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalState")
            .field("name", &self.inner.options.name)
            .field("initialized", &self.inner.registry.get().is_some())
            .field("triggers", &self.inner.triggers.len())
            .field("owner", &self.inner.owner)
            .finish()
    }
}
