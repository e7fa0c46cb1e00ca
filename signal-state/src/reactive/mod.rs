//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, and effects.
//! These primitives are the substrate the state container is built on.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal automatically
//! registers that context as a dependent. When the signal's value changes, all
//! dependents are notified.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only when
//! one of its dependencies changes.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its dependencies
//! change. Effects are used to synchronize reactive state with external systems.
//!
//! ## Owners
//!
//! An Owner ties effects and teardown callbacks to the lifetime of a context.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a signal is read, we check if there is an active
//! tracking context and, if so, register the dependency in the global graph.

mod context;
mod effect;
mod error;
mod memo;
mod owner;
mod runtime;
mod signal;

pub use context::{untracked, ReactiveContext};
pub use effect::Effect;
pub use error::ReactiveError;
pub use memo::{Memo, MemoState};
pub use owner::Owner;
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use signal::{ReadSignal, Readable, Signal};
