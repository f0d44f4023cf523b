use super::Error;

/// SQL generation needs a primary key column but the record has none.
#[derive(Debug)]
pub(super) struct MissingIdentity {
    table: Box<str>,
}

impl std::error::Error for MissingIdentity {}

impl core::fmt::Display for MissingIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "missing identity column for table {}", self.table)
    }
}

impl Error {
    /// Creates a missing identity error for `table`.
    pub fn missing_identity(table: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::MissingIdentity(MissingIdentity {
            table: table.into().into(),
        }))
    }

    /// Returns `true` if this error reports a missing identity column.
    pub fn is_missing_identity(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::MissingIdentity(_)))
    }
}
