//! Signal State
//!
//! This crate provides a typed reactive state container built on
//! fine-grained signals. It implements:
//!
//! - Reactive primitives (signals, memos, effects, owners)
//! - A dependency graph that propagates changes in topological order
//! - [`SignalState`], a container holding one reactive cell per record field
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Dependency graph and update ordering
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `state`: The state container (selectors, patches, sync bindings)
//!
//! # Example
//!
//! ```rust
//! use signal_state::reactive::Signal;
//! use signal_state::{field, Connections, Field, Fields, Record, SignalState};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Login {
//!     email: String,
//!     password: String,
//! }
//!
//! impl Login {
//!     const EMAIL: Field<Self, String> = field!(Login, email: String);
//!     const PASSWORD: Field<Self, String> = field!(Login, password: String);
//! }
//!
//! impl Record for Login {
//!     fn fields() -> Fields<Self> {
//!         Fields::new().with(Self::EMAIL).with(Self::PASSWORD)
//!     }
//! }
//!
//! let state = SignalState::new();
//! state.initialize(Login { email: String::new(), password: String::new() })?;
//!
//! // Keep the email field in sync with an input signal
//! let input = Signal::new(String::new());
//! state.connect(Connections::new().bind(Login::EMAIL, input.clone()))?;
//!
//! input.set("a@b.com".to_string());
//! assert_eq!(state.select(Login::EMAIL)?.get(), "a@b.com");
//! # Ok::<(), signal_state::StateError>(())
//! ```

pub mod graph;
pub mod reactive;
pub mod state;

pub use state::{
    from_future, BoxError, Connections, Field, FieldKey, Fields, Patch, Picked, Producer,
    ProducerConnections, Record, Selection, SignalState, StateError, StateOptions, SyncError, Value,
};
