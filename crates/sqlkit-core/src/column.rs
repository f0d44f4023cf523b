use crate::{driver::ColumnType, ScanType, Tag};

use std::sync::Arc;

/// A result-set or table column.
///
/// Columns are immutable once built. A column built from driver metadata
/// carries the full type information; a column built from a bare name only
/// carries its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    database_type: String,
    length: Option<i64>,
    decimal: Option<(i64, i64)>,
    nullable: Option<bool>,
    ordinal: Option<usize>,
    scan_type: Option<ScanType>,
    tag: Option<Arc<Tag>>,
}

impl Column {
    /// Column carrying only a name.
    pub fn new(name: impl Into<String>) -> Column {
        Column {
            name: name.into(),
            database_type: String::new(),
            length: None,
            decimal: None,
            nullable: None,
            ordinal: None,
            scan_type: None,
            tag: None,
        }
    }

    /// Column built from driver-reported metadata at `ordinal`.
    pub fn from_driver(ty: &ColumnType, ordinal: usize) -> Column {
        Column {
            name: ty.name.clone(),
            database_type: ty.database_type.clone(),
            length: ty.length,
            decimal: ty.decimal,
            nullable: ty.nullable,
            ordinal: Some(ordinal),
            scan_type: ty.scan_type.clone().or_else(|| {
                (!ty.database_type.is_empty())
                    .then(|| ScanType::from_database_type(&ty.database_type))
            }),
            tag: None,
        }
    }

    /// Builds columns from bare names, in order.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Vec<Column> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Column::new(name.as_ref()).with_ordinal(i))
            .collect()
    }

    /// Builds columns from driver metadata, in order.
    pub fn from_driver_types(types: &[ColumnType]) -> Vec<Column> {
        types
            .iter()
            .enumerate()
            .map(|(i, ty)| Column::from_driver(ty, i))
            .collect()
    }

    pub fn with_database_type(mut self, database_type: impl Into<String>) -> Column {
        self.database_type = database_type.into();
        self
    }

    pub fn with_scan_type(mut self, scan_type: ScanType) -> Column {
        self.scan_type = Some(scan_type);
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Column {
        self.nullable = Some(nullable);
        self
    }

    pub fn with_ordinal(mut self, ordinal: usize) -> Column {
        self.ordinal = Some(ordinal);
        self
    }

    pub fn with_tag(mut self, tag: Arc<Tag>) -> Column {
        self.tag = Some(tag);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rendered database type name, empty when unknown.
    pub fn database_type(&self) -> &str {
        &self.database_type
    }

    pub fn length(&self) -> Option<i64> {
        self.length
    }

    /// Decimal precision and scale.
    pub fn decimal(&self) -> Option<(i64, i64)> {
        self.decimal
    }

    pub fn nullable(&self) -> Option<bool> {
        self.nullable
    }

    pub fn ordinal(&self) -> Option<usize> {
        self.ordinal
    }

    pub fn scan_type(&self) -> Option<&ScanType> {
        self.scan_type.as_ref()
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_deref()
    }

    /// Returns `true` when the column's tag flags it as part of the primary key.
    pub fn is_identity(&self) -> bool {
        self.tag().is_some_and(|tag| tag.primary_key)
    }

    pub fn is_autoincrement(&self) -> bool {
        self.tag().is_some_and(|tag| tag.autoincrement)
    }
}

/// Joins column names with `", "`.
pub fn names(columns: &[Column]) -> String {
    let mut ret = String::new();
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            ret.push_str(", ");
        }
        ret.push_str(column.name());
    }
    ret
}
