use crate::graph::NodeId;

/// Errors raised by the reactive substrate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReactiveError {
    /// A signal was written from a computation that may not write, such as a
    /// memo or an effect created without write access.
    #[error(
        "signal {signal:?} written inside a read-only reactive computation; \
         use Effect::with_writes to allow writes from an effect"
    )]
    WriteInComputation { signal: NodeId },
}
