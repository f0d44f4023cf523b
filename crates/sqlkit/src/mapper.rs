//! Row mappers: turn result-set rows into records, slices, or maps.

use crate::{
    matcher::{Resolver, Slot},
    MapperCache,
};

use indexmap::IndexMap;
use sqlkit_core::{err, Column, Record, Result, ScanType, Value};

use std::sync::Arc;

/// Scans rows into records of type `T`.
pub struct RecordMapper<T> {
    columns: Vec<Column>,
    slots: Vec<Slot<T>>,
    resolver: Option<Arc<dyn Resolver>>,
}

impl<T> core::fmt::Debug for RecordMapper<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("RecordMapper")
            .field("columns", &sqlkit_core::column::names(&self.columns))
            .field("slots", &self.slots)
            .finish()
    }
}

impl<T: Record> RecordMapper<T> {
    /// Builds a mapper for `columns` through the process-wide mapper cache.
    pub fn new(columns: &[Column], resolver: Option<Arc<dyn Resolver>>) -> Result<RecordMapper<T>> {
        RecordMapper::with_cache(MapperCache::global(), columns, resolver)
    }

    pub fn with_cache(
        cache: &MapperCache,
        columns: &[Column],
        resolver: Option<Arc<dyn Resolver>>,
    ) -> Result<RecordMapper<T>> {
        let slots = cache.slots::<T>(columns, resolver.as_deref())?;
        Ok(RecordMapper {
            columns: columns.to_vec(),
            slots,
            resolver,
        })
    }

    /// Scans `row` into a fresh record. `row` is drained; its allocation is
    /// kept for the next row.
    pub fn scan(&self, row: &mut Vec<Value>, ordinal: usize) -> Result<T> {
        let mut record = T::default();
        self.scan_into(row, &mut record, ordinal)?;
        Ok(record)
    }
}

impl<T> RecordMapper<T> {
    /// Scans `row` into an existing record.
    pub fn scan_into(&self, row: &mut Vec<Value>, record: &mut T, ordinal: usize) -> Result<()> {
        if row.len() != self.slots.len() {
            return Err(err!(
                "row has {} cells, mapper expects {}",
                row.len(),
                self.slots.len()
            ));
        }

        for (slot, value) in self.slots.iter().zip(row.drain(..)) {
            match slot {
                Slot::Field { field, .. } => field
                    .accessor
                    .set(record, value)
                    .map_err(|e| e.context(err!("scanning into {}", field.path)))?,
                Slot::Resolved { column, scan_type } => {
                    if let Some(resolver) = &self.resolver {
                        let value = value.convert(scan_type)?;
                        resolver.assign(ordinal, column, value);
                    }
                }
                Slot::Unmatched { column } => {
                    return Err(err!("column {} is not bound", column.name()));
                }
            }
        }

        Ok(())
    }

    /// Reads the cells of the bound fields of `record`, in column order.
    /// Resolved columns read as NULL.
    pub fn values(&self, record: &T) -> Vec<Value> {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Field { field, .. } => field.accessor.value(record),
                _ => Value::Null,
            })
            .collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn slots(&self) -> &[Slot<T>] {
        &self.slots
    }
}

/// Scans rows into `Vec<Value>` or `IndexMap<String, Value>`.
///
/// Each column gets a holder type derived from its database type name,
/// falling back to the driver-reported scan type and then to opaque values.
/// Cells that do not convert to the holder type are kept as scanned.
#[derive(Debug, Clone)]
pub struct GenericMapper {
    columns: Vec<Column>,
    holders: Vec<ScanType>,
}

impl GenericMapper {
    pub fn new(columns: &[Column]) -> GenericMapper {
        GenericMapper {
            columns: columns.to_vec(),
            holders: columns.iter().map(holder).collect(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Holder scan type of each column.
    pub fn holders(&self) -> &[ScanType] {
        &self.holders
    }

    pub fn scan_slice(&self, row: &mut Vec<Value>) -> Vec<Value> {
        row.drain(..)
            .zip(&self.holders)
            .map(|(value, holder)| deref(value, holder))
            .collect()
    }

    pub fn scan_map(&self, row: &mut Vec<Value>) -> IndexMap<String, Value> {
        row.drain(..)
            .zip(&self.holders)
            .zip(&self.columns)
            .map(|((value, holder), column)| (column.name().to_string(), deref(value, holder)))
            .collect()
    }
}

fn holder(column: &Column) -> ScanType {
    let by_name = ScanType::from_database_type(column.database_type());
    match by_name {
        ScanType::Any => column.scan_type().cloned().unwrap_or(ScanType::Any),
        ty => ty,
    }
}

fn deref(value: Value, holder: &ScanType) -> Value {
    if matches!(holder.base(), ScanType::Any) || value.is_null() {
        return value;
    }

    match value.clone().convert(holder) {
        Ok(converted) => converted,
        Err(_) => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Unmapped;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default, PartialEq, sqlkit::Record)]
    struct Order {
        id: i64,
        total: f64,
        note: Option<String>,
    }

    #[test]
    fn scans_records() {
        let columns = Column::from_names(&["id", "total", "note"]);
        let mapper = RecordMapper::<Order>::new(&columns, None).unwrap();

        let mut row = vec![Value::I64(7), Value::String("12.5".into()), Value::Null];
        let order = mapper.scan(&mut row, 0).unwrap();
        assert_eq!(
            order,
            Order {
                id: 7,
                total: 12.5,
                note: None
            }
        );
        assert!(row.is_empty());
        assert_eq!(
            mapper.values(&order),
            [Value::I64(7), Value::F64(12.5), Value::Null]
        );
    }

    #[test]
    fn unmatched_cells_go_to_resolver() {
        let columns = Column::from_names(&["id", "color"]);
        let unmapped = Arc::new(Unmapped::new());
        let mapper = RecordMapper::<Order>::new(&columns, Some(unmapped.clone())).unwrap();

        let mut row = vec![Value::I64(1), Value::from("red")];
        mapper.scan(&mut row, 3).unwrap();

        let cells = unmapped.row(3).unwrap();
        assert_eq!(cells.get("color"), Some(&Value::from("red")));
    }

    #[test]
    fn generic_holders_follow_database_types() {
        let columns = vec![
            Column::new("n").with_database_type("INTEGER"),
            Column::new("s").with_database_type("VARCHAR(10)"),
            Column::new("at").with_database_type("TIMESTAMP"),
            Column::new("x"),
        ];
        let mapper = GenericMapper::new(&columns);
        assert_eq!(
            mapper.holders(),
            [ScanType::I64, ScanType::String, ScanType::Timestamp, ScanType::Any]
        );

        let mut row = vec![
            Value::from("42"),
            Value::I64(5),
            Value::from("not a time"),
            Value::Bool(true),
        ];
        let map = mapper.scan_map(&mut row);
        assert_eq!(map["n"], Value::I64(42));
        assert_eq!(map["s"], Value::from("5"));
        assert_eq!(map["at"], Value::from("not a time"));
        assert_eq!(map["x"], Value::Bool(true));
    }
}
