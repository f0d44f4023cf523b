//! Record types metadata rows are scanned into.
//!
//! Products name their catalog columns differently; every field matches its
//! column case-insensitively and columns a product does not return stay at
//! their defaults.

#[derive(Debug, Clone, Default, PartialEq, sqlkit::Record)]
pub struct Catalog {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, sqlkit::Record)]
pub struct Schema {
    pub catalog: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, sqlkit::Record)]
pub struct Table {
    pub catalog: String,
    pub schema: String,
    pub name: String,
    pub table_type: String,
}

/// One column of a table.
#[derive(Debug, Clone, Default, PartialEq, sqlkit::Record)]
pub struct TableColumn {
    pub table_name: String,
    pub column_name: String,
    pub position: Option<i64>,
    pub data_type: String,
    pub data_type_length: Option<i64>,
    pub numeric_precision: Option<i64>,
    pub numeric_scale: Option<i64>,
    pub is_nullable: String,
    pub column_default: Option<String>,
    pub is_autoincrement: Option<String>,
    pub key_position: Option<i64>,
}

impl TableColumn {
    pub fn nullable(&self) -> bool {
        self.is_nullable.eq_ignore_ascii_case("yes") || self.is_nullable == "1"
    }

    pub fn is_primary_key(&self) -> bool {
        self.key_position.unwrap_or(0) > 0
    }
}

/// Primary or foreign key column.
#[derive(Debug, Clone, Default, PartialEq, sqlkit::Record)]
pub struct Key {
    pub table_name: String,
    pub name: String,
    pub column_name: String,
    pub position: Option<i64>,
    pub key_type: String,
    pub ref_table: Option<String>,
    pub ref_column: Option<String>,
}

/// Index column.
#[derive(Debug, Clone, Default, PartialEq, sqlkit::Record)]
pub struct Index {
    pub table_name: String,
    pub name: String,
    pub column_name: String,
    pub position: Option<i64>,
    pub is_unique: Option<bool>,
    pub index_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, sqlkit::Record)]
pub struct Sequence {
    pub catalog: String,
    pub schema: String,
    pub name: String,
    pub value: Option<i64>,
    pub increment_by: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, sqlkit::Record)]
pub struct Function {
    pub catalog: String,
    pub schema: String,
    pub name: String,
    pub routine_type: Option<String>,
}

/// Server session.
#[derive(Debug, Clone, Default, PartialEq, sqlkit::Record)]
pub struct Session {
    pub pid: String,
    pub username: Option<String>,
    pub catalog: Option<String>,
    pub schema: Option<String>,
}
