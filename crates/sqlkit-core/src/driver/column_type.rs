use crate::ScanType;

/// Column metadata reported by a driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnType {
    /// Column name
    pub name: String,

    /// Database type name, e.g. `VARCHAR`
    pub database_type: String,

    /// Declared length for variable length types
    pub length: Option<i64>,

    /// Decimal precision and scale
    pub decimal: Option<(i64, i64)>,

    /// Whether the column accepts NULL, when known
    pub nullable: Option<bool>,

    /// Preferred in-memory representation, when the driver knows it
    pub scan_type: Option<ScanType>,
}

impl ColumnType {
    pub fn new(name: impl Into<String>, database_type: impl Into<String>) -> ColumnType {
        ColumnType {
            name: name.into(),
            database_type: database_type.into(),
            ..ColumnType::default()
        }
    }

    pub fn with_scan_type(mut self, scan_type: ScanType) -> ColumnType {
        self.scan_type = Some(scan_type);
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> ColumnType {
        self.nullable = Some(nullable);
        self
    }
}
