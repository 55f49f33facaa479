//! Typed view over collections.
//!
//! An [`Entity`] ties a Rust struct to a collection: its name, its column
//! declarations, the field enum used to build filters, and how to decode a
//! [`Record`]. The `Store` methods here are thin generic wrappers around the
//! record-level operations.

use super::*;

pub trait Entity: Sized {
    /// Column names usable in filters against this collection.
    type Field: Column;

    const COLLECTION: &'static str;
    /// Primary key column.
    const ID: Self::Field;
    /// `(column, type and constraints)` pairs passed to `create_collection`.
    const SCHEMA: &'static [(&'static str, &'static str)];

    fn from_record(record: &Record) -> Result<Self, DbError>;
}

impl Store {
    /// Create the entity's collection if it is missing.
    pub fn ensure_collection<T: Entity>(&self) -> Result<(), DbError> {
        self.create_collection(T::COLLECTION, T::SCHEMA)
    }

    pub fn select<T: Entity>(
        &self,
        filters: &[Filter<T::Field>],
        order_by: Option<OrderBy<T::Field>>,
    ) -> Result<Vec<T>, DbError> {
        self.get(T::COLLECTION, filters, order_by)?
            .iter()
            .map(T::from_record)
            .collect()
    }

    /// Point lookup by primary key. Absence is `Ok(None)`, not an error.
    pub fn find<T: Entity>(&self, id: i64) -> Result<Option<T>, DbError> {
        Ok(self
            .select::<T>(&[Filter::eq(T::ID, id)], None)?
            .into_iter()
            .next())
    }
}
