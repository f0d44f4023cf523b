/// Outcome of executing a statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Number of rows changed by the statement
    pub rows_affected: u64,

    /// Identifier generated by the last insert, when the driver reports it
    pub last_insert_id: Option<i64>,
}

impl ExecResult {
    pub fn new(rows_affected: u64) -> ExecResult {
        ExecResult {
            rows_affected,
            last_insert_id: None,
        }
    }

    pub fn with_last_insert_id(mut self, id: i64) -> ExecResult {
        self.last_insert_id = Some(id);
        self
    }
}
