//! Mutation gateway: the only write path into the cells.

use std::fmt;

use tracing::trace;

use super::error::StateError;
use super::record::{Field, Record, Value};
use super::registry::CellRegistry;
use super::SignalState;

/// One pending field write inside a [`Patch`].
pub(crate) trait PatchWrite<R>: Send {
    fn name(&self) -> &'static str;

    /// Check the write against the registry without applying it.
    fn validate(&self, registry: &CellRegistry<R>) -> Result<(), StateError>;

    /// Apply the write. Returns whether readers were notified.
    fn apply(self: Box<Self>, registry: &CellRegistry<R>, notify_unchanged: bool) -> Result<bool, StateError>;
}

pub(crate) struct FieldWrite<R, V> {
    field: Field<R, V>,
    value: V,
}

impl<R, V> FieldWrite<R, V> {
    pub(crate) fn new(field: Field<R, V>, value: V) -> Self {
        Self { field, value }
    }
}

impl<R, V> PatchWrite<R> for FieldWrite<R, V>
where
    R: Record,
    V: Value,
{
    fn name(&self) -> &'static str {
        self.field.name()
    }

    fn validate(&self, registry: &CellRegistry<R>) -> Result<(), StateError> {
        registry.cell(self.field).map(|_| ())
    }

    fn apply(self: Box<Self>, registry: &CellRegistry<R>, notify_unchanged: bool) -> Result<bool, StateError> {
        let cell = registry.cell(self.field)?;
        if notify_unchanged {
            cell.try_set(self.value)?;
            Ok(true)
        } else {
            Ok(cell.try_set_if_changed(self.value)?)
        }
    }
}

/// A partial record: the fields to write and their new values.
///
/// Fields absent from the patch are left untouched.
///
/// ```rust,ignore
/// state.patch(Patch::new().set(Login::EMAIL, email).set(Login::BUSY, false))?;
/// ```
pub struct Patch<R> {
    writes: Vec<Box<dyn PatchWrite<R>>>,
}

impl<R: Record> Patch<R> {
    pub fn new() -> Self {
        Self { writes: Vec::new() }
    }

    /// Add a write of `value` into `field`.
    ///
    /// Setting the same field twice keeps both writes; the later one wins.
    pub fn set<V: Value>(mut self, field: Field<R, V>, value: V) -> Self {
        self.writes.push(Box::new(FieldWrite::new(field, value)));
        self
    }

    /// A patch writing every declared field from `record`.
    pub fn from_record(record: R) -> Self {
        Self {
            writes: R::fields()
                .defs
                .iter()
                .map(|def| def.write_from(&record))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Names of the written fields, in write order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.writes.iter().map(|write| write.name())
    }
}

impl<R: Record> Default for Patch<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> fmt::Debug for Patch<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patch")
            .field("fields", &self.fields().collect::<Vec<_>>())
            .finish()
    }
}

impl<R: Record> SignalState<R> {
    /// Write every field present in `patch` into its cell.
    ///
    /// Each write is an independent cell write, applied in patch order. All
    /// fields are checked before the first write, so a patch naming an
    /// undeclared field writes nothing.
    pub fn patch(&self, patch: Patch<R>) -> Result<(), StateError> {
        let registry = self.registry()?;
        for write in &patch.writes {
            write.validate(registry)?;
        }

        let notify_unchanged = self.inner.options.notify_unchanged;
        for write in patch.writes {
            let field = write.name();
            let notified = write.apply(registry, notify_unchanged)?;
            trace!(state = %self.inner.options.name, field, notified, "cell write");
        }
        Ok(())
    }

    /// Write a single field.
    pub fn set<V: Value>(&self, field: Field<R, V>, value: V) -> Result<(), StateError> {
        self.patch(Patch::new().set(field, value))
    }

    /// Write coming from a sync binding.
    ///
    /// Equal values never notify here, regardless of `notify_unchanged`, so
    /// bindings that feed each other (two containers connected both ways)
    /// settle once the values agree.
    pub(crate) fn sync_write<V: Value>(&self, field: Field<R, V>, value: V) -> Result<bool, StateError> {
        let notified = self.registry()?.cell(field)?.try_set_if_changed(value)?;
        trace!(state = %self.inner.options.name, field = field.name(), notified, "synced cell write");
        Ok(notified)
    }
}
