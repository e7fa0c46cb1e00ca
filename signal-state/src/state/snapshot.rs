use super::error::StateError;
use super::record::Record;
use super::SignalState;
use crate::reactive::{untracked, Memo};

impl<R: Record> SignalState<R> {
    /// A read-only view of the whole record.
    ///
    /// Depends on every cell, so it recomputes after any field changes.
    pub fn state(&self) -> Result<Memo<R>, StateError> {
        let registry = self.registry()?.clone();
        Ok(Memo::new(move || registry.compose()))
    }

    /// The current record, read without subscribing.
    ///
    /// Calling this inside a memo or effect does not make it depend on the
    /// state.
    pub fn snapshot(&self) -> Result<R, StateError> {
        let registry = self.registry()?;
        Ok(untracked(|| registry.compose()))
    }
}
