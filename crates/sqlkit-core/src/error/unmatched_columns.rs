use super::Error;

/// Result-set columns that do not correspond to any reachable record field.
#[derive(Debug)]
pub(super) struct UnmatchedColumns {
    columns: Vec<String>,
}

impl std::error::Error for UnmatchedColumns {}

impl core::fmt::Display for UnmatchedColumns {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "unmatched columns: [{}]", self.columns.join(", "))
    }
}

impl Error {
    /// Creates an unmatched columns error naming exactly `columns`.
    pub fn unmatched_columns(columns: Vec<String>) -> Error {
        Error::from(super::ErrorKind::UnmatchedColumns(UnmatchedColumns {
            columns,
        }))
    }

    /// Returns `true` if this error reports unmatched columns.
    pub fn is_unmatched_columns(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::UnmatchedColumns(_)))
    }

    /// Returns the unmatched column names when this error reports them.
    pub fn unmatched(&self) -> Option<&[String]> {
        self.chain().find_map(|err| match err.kind() {
            super::ErrorKind::UnmatchedColumns(err) => Some(&err.columns[..]),
            _ => None,
        })
    }
}
