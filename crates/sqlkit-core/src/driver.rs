//! The driver contract.
//!
//! sqlkit only talks to databases through the prepared statement / rows
//! iterator surface defined here. Driver crates implement these traits on top
//! of their native client library.

mod column_type;
pub use column_type::ColumnType;

mod exec_result;
pub use exec_result::ExecResult;

use crate::{async_trait, Error, Result, Value};

use std::{fmt::Debug, sync::Arc};

/// A handle to a database, usually a connection pool.
#[async_trait]
pub trait Connection: Debug + Send + Sync + 'static {
    /// Name of the driver, e.g. `sqlite3` or `mysql`. Used as a fallback
    /// to detect the database product.
    fn driver_name(&self) -> &str;

    /// Prepares a statement outside of any transaction.
    async fn prepare(&self, sql: &str) -> Result<Box<dyn Statement>>;

    /// Starts a transaction.
    async fn begin(&self) -> Result<Arc<dyn Transaction>>;

    /// Submits a bulk-load body for `sql`.
    ///
    /// Drivers that can stream a local body to the server (for example
    /// `LOAD DATA LOCAL INFILE`) override this.
    async fn load(&self, sql: &str, body: Vec<u8>) -> Result<ExecResult> {
        let _ = body;
        Err(Error::unsupported(format!(
            "driver {} cannot stream a load body for: {sql}",
            self.driver_name()
        )))
    }
}

/// An open transaction.
///
/// Commit and rollback take `&self` so a transaction can be shared between a
/// caller and the sessions it hands the transaction to.
#[async_trait]
pub trait Transaction: Debug + Send + Sync {
    /// Prepares a statement bound to this transaction.
    async fn prepare(&self, sql: &str) -> Result<Box<dyn Statement>>;

    async fn commit(&self) -> Result<()>;

    async fn rollback(&self) -> Result<()>;
}

/// A prepared statement.
#[async_trait]
pub trait Statement: Send + Sync {
    /// Runs the statement as a query.
    async fn query(&mut self, args: &[Value]) -> Result<Box<dyn Rows>>;

    /// Runs the statement for its side effects.
    async fn exec(&mut self, args: &[Value]) -> Result<ExecResult>;

    /// Releases driver resources held by the statement.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A result set iterator.
#[async_trait]
pub trait Rows: Send {
    /// Column names, in result-set order.
    fn columns(&self) -> Vec<String>;

    /// Driver-reported column metadata, when the driver provides it.
    fn column_types(&self) -> Option<Vec<ColumnType>> {
        None
    }

    /// Advances to the next row and writes its cells into `dst`, replacing
    /// any previous content. Returns `false` once the rows are exhausted.
    async fn next(&mut self, dst: &mut Vec<Value>) -> Result<bool>;

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
