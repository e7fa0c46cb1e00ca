//! Cell registry: one signal per declared field.

use std::any::Any;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::error::StateError;
use super::record::{Field, FieldKey, Record, Value};
use super::select::Selection;
use crate::reactive::Signal;

/// Type-erased cell for one field of `R`.
pub(crate) trait ErasedCell<R>: Send + Sync {
    fn name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    /// Copy the current value into `record`, tracking the read.
    fn read_into(&self, record: &mut R);

    /// A boxed `ReadSignal<V>` over this cell.
    fn read_only(&self) -> Box<dyn Any + Send + Sync>;
}

pub(crate) struct FieldCell<R, V>
where
    V: Value,
{
    field: Field<R, V>,
    signal: Signal<V>,
}

impl<R, V> FieldCell<R, V>
where
    V: Value,
{
    pub(crate) fn new(field: Field<R, V>, initial: V) -> Self {
        Self {
            field,
            signal: Signal::new(initial),
        }
    }
}

impl<R, V> ErasedCell<R> for FieldCell<R, V>
where
    R: Record,
    V: Value,
{
    fn name(&self) -> &'static str {
        self.field.name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn read_into(&self, record: &mut R) {
        *self.field.get_mut(record) = self.signal.get();
    }

    fn read_only(&self) -> Box<dyn Any + Send + Sync> {
        Box::new(self.signal.read_only())
    }
}

/// The cells of an initialized container, keyed by field name.
///
/// Built once by `initialize` and never resized afterwards.
pub(crate) struct CellRegistry<R> {
    /// The initial record; composed views start from a copy of it.
    template: R,
    cells: IndexMap<&'static str, Box<dyn ErasedCell<R>>>,
}

pub(crate) type FieldNames = SmallVec<[&'static str; 4]>;

impl<R: Record> CellRegistry<R> {
    pub(crate) fn build(initial: R) -> Result<Self, StateError> {
        let fields = R::fields();
        let mut cells: IndexMap<&'static str, Box<dyn ErasedCell<R>>> =
            IndexMap::with_capacity(fields.len());

        for def in fields.defs {
            let name = def.name();
            if cells.contains_key(name) {
                return Err(StateError::DuplicateField { field: name });
            }
            cells.insert(name, def.make_cell(&initial));
        }

        Ok(Self {
            template: initial,
            cells,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    fn entry(&self, name: &'static str) -> Result<&dyn ErasedCell<R>, StateError> {
        self.cells
            .get(name)
            .map(|cell| cell.as_ref())
            .ok_or(StateError::UnknownField { field: name })
    }

    /// The cell behind `field`.
    pub(crate) fn cell<V: Value>(&self, field: Field<R, V>) -> Result<&Signal<V>, StateError> {
        self.entry(field.name())?
            .as_any()
            .downcast_ref::<FieldCell<R, V>>()
            .map(|cell| &cell.signal)
            .ok_or(StateError::FieldTypeMismatch {
                field: field.name(),
            })
    }

    /// Check that every key names a declared field.
    pub(crate) fn resolve<I>(&self, keys: I) -> Result<FieldNames, StateError>
    where
        I: IntoIterator<Item = FieldKey<R>>,
    {
        keys.into_iter()
            .map(|key| self.entry(key.name()).map(|cell| cell.name()))
            .collect()
    }

    /// Read-only handles for the given, already resolved, fields.
    pub(crate) fn read_only(&self, names: &[&'static str]) -> Vec<(&'static str, Box<dyn Any + Send + Sync>)> {
        names
            .iter()
            .filter_map(|name| self.cells.get(name).map(|cell| (*name, cell.read_only())))
            .collect()
    }

    /// The full record, reading (and tracking) every cell.
    pub(crate) fn compose(&self) -> R {
        let mut record = self.template.clone();
        for cell in self.cells.values() {
            cell.read_into(&mut record);
        }
        record
    }

    /// A record where only `names` are read (and tracked).
    pub(crate) fn select(&self, names: &FieldNames) -> Selection<R> {
        let mut record = self.template.clone();
        for name in names {
            if let Some(cell) = self.cells.get(name) {
                cell.read_into(&mut record);
            }
        }
        Selection::new(record, names.clone())
    }
}
