//! Typed record model.
//!
//! A state record is an ordinary Rust struct. Its fields are declared once,
//! through [`Record::fields`], as [`Field`] descriptors: a name plus accessor
//! functions. The container builds one cell per declared field and uses the
//! descriptors for every typed read and write afterwards.
//!
//! ```rust
//! use signal_state::{field, Field, Fields, Record};
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
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use super::patch::{FieldWrite, PatchWrite};
use super::registry::{ErasedCell, FieldCell};

/// A state record: a fixed set of named, typed fields.
pub trait Record: Clone + Send + Sync + 'static {
    /// Declare the fields of this record. Called once per initialization.
    fn fields() -> Fields<Self>;
}

/// Bound shared by every field value.
pub trait Value: Clone + PartialEq + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// Typed descriptor of one field of `R` holding a `V`.
pub struct Field<R, V> {
    name: &'static str,
    get: fn(&R) -> &V,
    get_mut: fn(&mut R) -> &mut V,
}

impl<R, V> Field<R, V> {
    pub const fn new(name: &'static str, get: fn(&R) -> &V, get_mut: fn(&mut R) -> &mut V) -> Self {
        Self { name, get, get_mut }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Borrow this field from a record.
    pub fn get<'r>(&self, record: &'r R) -> &'r V {
        (self.get)(record)
    }

    pub fn get_mut<'r>(&self, record: &'r mut R) -> &'r mut V {
        (self.get_mut)(record)
    }

    /// The untyped key of this field, for multi-field operations.
    pub fn key(&self) -> FieldKey<R> {
        FieldKey::new(self.name)
    }
}

impl<R, V> Clone for Field<R, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R, V> Copy for Field<R, V> {}

impl<R, V> fmt::Debug for Field<R, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.name).finish()
    }
}

/// Build a [`Field`] for a named struct field.
///
/// ```rust,ignore
/// const EMAIL: Field<Login, String> = field!(Login, email: String);
/// ```
#[macro_export]
macro_rules! field {
    ($record:ty, $name:ident : $value:ty) => {
        $crate::state::Field::<$record, $value>::new(
            ::core::stringify!($name),
            |record| &record.$name,
            |record| &mut record.$name,
        )
    };
}

/// Untyped field name of a record `R`.
pub struct FieldKey<R> {
    name: &'static str,
    _record: PhantomData<fn() -> R>,
}

impl<R> FieldKey<R> {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self {
            name,
            _record: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<R, V> From<Field<R, V>> for FieldKey<R> {
    fn from(field: Field<R, V>) -> Self {
        field.key()
    }
}

impl<R> Clone for FieldKey<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for FieldKey<R> {}

impl<R> PartialEq for FieldKey<R> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<R> Eq for FieldKey<R> {}

impl<R> Hash for FieldKey<R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl<R> fmt::Debug for FieldKey<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldKey").field(&self.name).finish()
    }
}

/// Type-erased field declaration.
pub(crate) trait FieldDef<R>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Create the cell for this field, seeded from `initial`.
    fn make_cell(&self, initial: &R) -> Box<dyn ErasedCell<R>>;

    /// A patch write carrying this field's value in `record`.
    fn write_from(&self, record: &R) -> Box<dyn PatchWrite<R>>;
}

impl<R, V> FieldDef<R> for Field<R, V>
where
    R: Record,
    V: Value,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn make_cell(&self, initial: &R) -> Box<dyn ErasedCell<R>> {
        Box::new(FieldCell::new(*self, self.get(initial).clone()))
    }

    fn write_from(&self, record: &R) -> Box<dyn PatchWrite<R>> {
        Box::new(FieldWrite::new(*self, self.get(record).clone()))
    }
}

/// The declared field set of a record.
pub struct Fields<R> {
    pub(crate) defs: Vec<Box<dyn FieldDef<R>>>,
}

impl<R: Record> Fields<R> {
    pub fn new() -> Self {
        Self { defs: Vec::new() }
    }

    /// Declare one more field.
    pub fn with<V: Value>(mut self, field: Field<R, V>) -> Self {
        self.defs.push(Box::new(field));
        self
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.defs.iter().map(|def| def.name())
    }
}

impl<R: Record> Default for Fields<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Profile {
        name: String,
        age: u8,
    }

    impl Profile {
        const NAME: Field<Self, String> = field!(Profile, name: String);
        const AGE: Field<Self, u8> = field!(Profile, age: u8);
    }

    impl Record for Profile {
        fn fields() -> Fields<Self> {
            Fields::new().with(Self::NAME).with(Self::AGE)
        }
    }

    #[test]
    fn field_accessors_read_and_write() {
        let mut profile = Profile {
            name: "ada".into(),
            age: 36,
        };

        assert_eq!(Profile::NAME.get(&profile), "ada");
        *Profile::AGE.get_mut(&mut profile) += 1;
        assert_eq!(profile.age, 37);
    }

    #[test]
    fn keys_compare_by_name() {
        assert_eq!(Profile::NAME.key(), FieldKey::from(Profile::NAME));
        assert_ne!(Profile::NAME.key(), Profile::AGE.key());
        assert_eq!(Profile::AGE.key().name(), "age");
    }

    #[test]
    fn fields_keep_declaration_order() {
        let fields = Profile::fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.names().collect::<Vec<_>>(), vec!["name", "age"]);
    }
}
