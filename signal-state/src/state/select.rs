//! Selector engine: read-only derived views over the cells.

use std::any::Any;
use std::fmt;

use indexmap::IndexMap;

use super::error::StateError;
use super::record::{Field, FieldKey, Record, Value};
use super::registry::FieldNames;
use super::SignalState;
use crate::reactive::{Memo, ReadSignal};

/// The values of a chosen subset of fields.
///
/// Produced by [`SignalState::select_many`]; only the selected fields can be
/// read back.
#[derive(Clone)]
pub struct Selection<R> {
    record: R,
    fields: FieldNames,
}

impl<R> Selection<R> {
    pub(crate) fn new(record: R, fields: FieldNames) -> Self {
        Self { record, fields }
    }

    /// The value of `field`, if it is part of the selection.
    pub fn get<V>(&self, field: Field<R, V>) -> Option<&V> {
        self.fields
            .contains(&field.name())
            .then(|| field.get(&self.record))
    }

    pub fn contains(&self, key: impl Into<FieldKey<R>>) -> bool {
        self.fields.contains(&key.into().name())
    }

    /// Selected field names, in selection order.
    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }
}

impl<R: PartialEq> PartialEq for Selection<R> {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields && self.record == other.record
    }
}

impl<R> fmt::Debug for Selection<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Live read-only handles to chosen cells, as returned by
/// [`SignalState::pick`].
pub struct Picked<R> {
    handles: IndexMap<&'static str, Box<dyn Any + Send + Sync>>,
    _record: std::marker::PhantomData<fn() -> R>,
}

impl<R> Picked<R> {
    /// The handle for `field`, if it was picked.
    pub fn get<V: Value>(&self, field: Field<R, V>) -> Option<ReadSignal<V>> {
        self.handles
            .get(field.name())
            .and_then(|handle| handle.downcast_ref::<ReadSignal<V>>())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handles.keys().copied()
    }
}

impl<R> fmt::Debug for Picked<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Picked")
            .field("fields", &self.handles.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<R: Record> SignalState<R> {
    /// A read-only view mirroring one field.
    pub fn select<V: Value>(&self, field: Field<R, V>) -> Result<Memo<V>, StateError> {
        self.select_with(field, V::clone)
    }

    /// A read-only view of `transform` applied to one field.
    ///
    /// `transform` must be pure; it runs again whenever the field changes
    /// and the view is read.
    pub fn select_with<V, U, F>(&self, field: Field<R, V>, transform: F) -> Result<Memo<U>, StateError>
    where
        V: Value,
        U: Clone + Send + Sync + 'static,
        F: Fn(&V) -> U + Send + Sync + 'static,
    {
        let cell = self.registry()?.cell(field)?.clone();
        Ok(Memo::new(move || transform(&cell.get())))
    }

    /// A read-only view over several fields at once.
    ///
    /// The view depends only on the listed fields.
    pub fn select_many<I>(&self, keys: I) -> Result<Memo<Selection<R>>, StateError>
    where
        I: IntoIterator<Item = FieldKey<R>>,
    {
        self.select_many_with(keys, Selection::clone)
    }

    /// A read-only view of `transform` applied to several fields.
    pub fn select_many_with<I, P, F>(&self, keys: I, transform: F) -> Result<Memo<P>, StateError>
    where
        I: IntoIterator<Item = FieldKey<R>>,
        P: Clone + Send + Sync + 'static,
        F: Fn(&Selection<R>) -> P + Send + Sync + 'static,
    {
        let registry = self.registry()?.clone();
        let names = registry.resolve(keys)?;
        Ok(Memo::new(move || transform(&registry.select(&names))))
    }

    /// Direct read-only handles to the listed cells.
    ///
    /// Unlike views, the handles read the cells themselves, so they always
    /// observe the latest value with no derivation in between.
    pub fn pick<I>(&self, keys: I) -> Result<Picked<R>, StateError>
    where
        I: IntoIterator<Item = FieldKey<R>>,
    {
        let registry = self.registry()?;
        let names = registry.resolve(keys)?;
        Ok(Picked {
            handles: registry.read_only(&names).into_iter().collect(),
            _record: std::marker::PhantomData,
        })
    }

    /// Direct read-only handle to a single cell.
    pub fn pick_one<V: Value>(&self, field: Field<R, V>) -> Result<ReadSignal<V>, StateError> {
        Ok(self.registry()?.cell(field)?.read_only())
    }
}
