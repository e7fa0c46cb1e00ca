use serde::{Deserialize, Serialize};

/// Construction-time options of a [`SignalState`](super::SignalState).
///
/// Every field has a default, so partial documents deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateOptions {
    /// Label attached to every log event of the container.
    pub name: String,

    /// Notify readers even when a patch writes a value equal to the
    /// current one. Writes from `connect` and producer bindings always skip
    /// equal values.
    pub notify_unchanged: bool,

    /// How many producer errors `errors()` receivers may lag behind.
    pub error_capacity: usize,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            name: "signal_state".to_string(),
            notify_unchanged: false,
            error_capacity: 16,
        }
    }
}

impl StateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn notify_unchanged(mut self, notify: bool) -> Self {
        self.notify_unchanged = notify;
        self
    }

    pub fn error_capacity(mut self, capacity: usize) -> Self {
        self.error_capacity = capacity;
        self
    }
}
