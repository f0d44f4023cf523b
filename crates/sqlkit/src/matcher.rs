//! Column to field matching.
//!
//! A [`Matcher`] indexes every leaf field of a record under the names a
//! result-set column may use for it. Each name is registered in three
//! spellings (as declared, lower-cased, and lower-cased without underscores)
//! and lookups try them in that order. The first registration of a key wins.

use crate::field::{Field, Fields};

use indexmap::IndexMap;
use sqlkit_core::{Column, Error, Record, Result, ScanType, Value};

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

/// Receives the cells of columns that match no record field.
pub trait Resolver: Send + Sync {
    /// Scan type to read an unmatched column with, or `None` to leave the
    /// column unmatched.
    fn resolve(&self, column: &Column) -> Option<ScanType>;

    /// Receives the cell of an unmatched column for the row at `ordinal`.
    fn assign(&self, ordinal: usize, column: &Column, value: Value);
}

/// Binding of one result-set column.
pub enum Slot<T> {
    /// The column scans into a record field.
    Field {
        field: Arc<Field<T>>,

        /// The column's scan type agrees with the field's
        type_matches: bool,
    },

    /// No field matched and no resolver has been bound yet.
    Unmatched { column: Column },

    /// No field matched; the cell is handed to the resolver.
    Resolved { column: Column, scan_type: ScanType },
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        match self {
            Slot::Field {
                field,
                type_matches,
            } => Slot::Field {
                field: field.clone(),
                type_matches: *type_matches,
            },
            Slot::Unmatched { column } => Slot::Unmatched {
                column: column.clone(),
            },
            Slot::Resolved { column, scan_type } => Slot::Resolved {
                column: column.clone(),
                scan_type: scan_type.clone(),
            },
        }
    }
}

impl<T> core::fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Slot::Field {
                field,
                type_matches,
            } => f
                .debug_struct("Field")
                .field("path", &field.path)
                .field("type_matches", type_matches)
                .finish(),
            Slot::Unmatched { column } => f
                .debug_struct("Unmatched")
                .field("column", &column.name())
                .finish(),
            Slot::Resolved { column, scan_type } => f
                .debug_struct("Resolved")
                .field("column", &column.name())
                .field("scan_type", scan_type)
                .finish(),
        }
    }
}

impl<T> Slot<T> {
    pub fn field(&self) -> Option<&Field<T>> {
        match self {
            Slot::Field { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn is_unmatched(&self) -> bool {
        matches!(self, Slot::Unmatched { .. })
    }
}

/// Name index over the leaf fields of a record type.
pub struct Matcher<T> {
    fields: Vec<Arc<Field<T>>>,
    index: HashMap<String, usize>,
}

impl<T: Record> Matcher<T> {
    /// Matcher over every data field of `T`.
    pub fn for_record() -> Result<Matcher<T>> {
        Ok(Matcher::new(Fields::<T>::of()?.data))
    }
}

impl<T> Matcher<T> {
    pub fn new(fields: Vec<Field<T>>) -> Matcher<T> {
        let mut index = HashMap::new();

        for (position, field) in fields.iter().enumerate() {
            for name in field.candidates() {
                for key in spellings(&name) {
                    index.entry(key).or_insert(position);
                }
            }
        }

        Matcher {
            fields: fields.into_iter().map(Arc::new).collect(),
            index,
        }
    }

    /// Position of the field a column named `name` refers to.
    pub fn lookup(&self, name: &str) -> Option<usize> {
        spellings(name)
            .into_iter()
            .find_map(|key| self.index.get(&key).copied())
    }

    pub fn fields(&self) -> &[Arc<Field<T>>] {
        &self.fields
    }

    /// Binds each column to a field. Columns without a field are kept as
    /// [`Slot::Unmatched`]; the result has one slot per column.
    pub fn match_columns(&self, columns: &[Column]) -> Vec<Slot<T>> {
        columns
            .iter()
            .map(|column| match self.lookup(column.name()) {
                Some(position) => {
                    let field = self.fields[position].clone();
                    let type_matches = scan_type_matches(column, &field);
                    Slot::Field {
                        field,
                        type_matches,
                    }
                }
                None => Slot::Unmatched {
                    column: column.clone(),
                },
            })
            .collect()
    }
}

fn scan_type_matches<T>(column: &Column, field: &Field<T>) -> bool {
    column
        .scan_type()
        .map_or(true, |ty| ty.matches(field.accessor.scan_type()))
}

/// Recomputes `type_matches` of every field slot against `columns`, which
/// must be the columns the slots were matched on, in order. Returns the
/// number of field slots whose column type disagrees with the field.
pub fn recheck<T>(slots: &mut [Slot<T>], columns: &[Column]) -> usize {
    let mut mismatched = 0;
    for (slot, column) in slots.iter_mut().zip(columns) {
        if let Slot::Field {
            field,
            type_matches,
        } = slot
        {
            *type_matches = scan_type_matches(column, field);
            if !*type_matches {
                mismatched += 1;
            }
        }
    }
    mismatched
}

/// Hands unmatched slots to `resolver`. Fails naming every column neither a
/// field nor the resolver accepts.
pub fn bind<T>(slots: Vec<Slot<T>>, resolver: Option<&dyn Resolver>) -> Result<Vec<Slot<T>>> {
    let mut unmatched = vec![];

    let slots = slots
        .into_iter()
        .map(|slot| match slot {
            Slot::Unmatched { column } => {
                match resolver.and_then(|resolver| resolver.resolve(&column)) {
                    Some(scan_type) => Slot::Resolved { column, scan_type },
                    None => {
                        unmatched.push(column.name().to_string());
                        Slot::Unmatched { column }
                    }
                }
            }
            slot => slot,
        })
        .collect();

    if !unmatched.is_empty() {
        return Err(Error::unmatched_columns(unmatched));
    }

    Ok(slots)
}

fn spellings(name: &str) -> [String; 3] {
    let lower = name.to_lowercase();
    let fuzzy = lower.replace('_', "");
    [name.to_string(), lower, fuzzy]
}

/// Resolver collecting the cells of unmatched columns per row.
#[derive(Debug, Default)]
pub struct Unmapped {
    rows: Mutex<BTreeMap<usize, IndexMap<String, Value>>>,
}

impl Unmapped {
    pub fn new() -> Unmapped {
        Unmapped::default()
    }

    /// Unmatched cells of the row at `ordinal`.
    pub fn row(&self, ordinal: usize) -> Option<IndexMap<String, Value>> {
        self.lock().get(&ordinal).cloned()
    }

    /// Takes every collected row, keyed by row ordinal.
    pub fn take(&self) -> BTreeMap<usize, IndexMap<String, Value>> {
        std::mem::take(&mut *self.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<usize, IndexMap<String, Value>>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Resolver for Unmapped {
    fn resolve(&self, column: &Column) -> Option<ScanType> {
        Some(column.scan_type().cloned().unwrap_or(ScanType::Any))
    }

    fn assign(&self, ordinal: usize, column: &Column, value: Value) {
        self.lock()
            .entry(ordinal)
            .or_default()
            .insert(column.name().to_string(), value);
    }
}

/// Resolver accepting and discarding every unmatched column.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl Resolver for Discard {
    fn resolve(&self, _column: &Column) -> Option<ScanType> {
        Some(ScanType::Any)
    }

    fn assign(&self, _ordinal: usize, _column: &Column, _value: Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default, sqlkit::Record)]
    struct Z {
        #[sqlkit("ID")]
        id: i64,
    }

    #[derive(Debug, Default, sqlkit::Record)]
    struct Foo {
        #[sqlkit("ID")]
        id: i64,
        #[sqlkit("ns=z")]
        z: Z,
    }

    #[test]
    fn nested_namespace() {
        let matcher = Matcher::<Foo>::for_record().unwrap();
        let slots = matcher.match_columns(&Column::from_names(&["ID", "Z_ID"]));
        assert_eq!(slots.len(), 2);

        let mut record = Foo::default();
        let accessor = |i: usize| slots[i].field().unwrap().accessor.clone();
        accessor(0).set(&mut record, Value::I64(1)).unwrap();
        accessor(1).set(&mut record, Value::I64(2)).unwrap();

        assert_eq!(record.id, 1);
        assert_eq!(record.z.id, 2);
    }

    #[derive(Debug, Default, sqlkit::Record)]
    struct User {
        user_id: i64,
        #[sqlkit("full_name|name")]
        display: String,
    }

    #[test]
    fn spellings_and_aliases() {
        let matcher = Matcher::<User>::for_record().unwrap();
        assert_eq!(matcher.lookup("user_id"), Some(0));
        assert_eq!(matcher.lookup("USER_ID"), Some(0));
        assert_eq!(matcher.lookup("UserId"), Some(0));
        assert_eq!(matcher.lookup("FULL_NAME"), Some(1));
        assert_eq!(matcher.lookup("name"), Some(1));
        assert_eq!(matcher.lookup("display"), Some(1));
        assert_eq!(matcher.lookup("email"), None);
    }

    #[test]
    fn unmatched_without_resolver_fails() {
        let matcher = Matcher::<User>::for_record().unwrap();
        let slots = matcher.match_columns(&Column::from_names(&["user_id", "email", "age"]));

        let err = bind(slots, None).unwrap_err();
        assert!(err.is_unmatched_columns());
        assert_eq!(err.unmatched().unwrap(), ["email", "age"]);
    }

    #[test]
    fn unmatched_with_resolver() {
        let matcher = Matcher::<User>::for_record().unwrap();
        let slots = matcher.match_columns(&Column::from_names(&["user_id", "email"]));

        let unmapped = Unmapped::new();
        let slots = bind(slots, Some(&unmapped)).unwrap();
        assert!(matches!(slots[1], Slot::Resolved { .. }));
    }

    #[test]
    fn scan_type_mismatch_is_recorded() {
        let matcher = Matcher::<User>::for_record().unwrap();
        let columns = [Column::new("user_id").with_scan_type(ScanType::String)];
        let slots = matcher.match_columns(&columns);
        assert!(matches!(
            slots[0],
            Slot::Field {
                type_matches: false,
                ..
            }
        ));
    }
}
