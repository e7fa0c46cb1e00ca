use thiserror::Error;

use crate::reactive::ReactiveError;

/// Errors returned by [`SignalState`](super::SignalState) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("signal state is not initialized yet, call initialize() before using any other method")]
    NotInitialized,

    #[error("signal state is already initialized")]
    AlreadyInitialized,

    #[error("no trigger registered for field `{field}`; bind it with connect_producers() first")]
    NoTriggerRegistered { field: &'static str },

    #[error("field `{field}` is not declared by the state record")]
    UnknownField { field: &'static str },

    #[error("field `{field}` is declared more than once")]
    DuplicateField { field: &'static str },

    #[error("field `{field}` was accessed with the wrong value type")]
    FieldTypeMismatch { field: &'static str },

    #[error("connect_producers() must be called from within a tokio runtime")]
    NoAsyncRuntime,

    #[error(transparent)]
    Reactive(#[from] ReactiveError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;

    #[test]
    fn messages_name_the_field() {
        let err = StateError::NoTriggerRegistered { field: "user" };
        assert!(err.to_string().contains("`user`"));
        assert!(err.to_string().contains("connect_producers"));
    }

    #[test]
    fn reactive_errors_convert() {
        let signal = NodeId::new();
        let err: StateError = ReactiveError::WriteInComputation { signal }.into();
        assert_eq!(err, StateError::Reactive(ReactiveError::WriteInComputation { signal }));
    }
}
