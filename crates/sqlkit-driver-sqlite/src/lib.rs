mod transaction_manager;
use transaction_manager::TransactionManager;

mod value;
use value::Value;

use rusqlite::Connection as RusqliteConnection;
use sqlkit_core::{
    async_trait,
    driver::{self, ColumnType, ExecResult},
    err, Error, Result, Value as CoreValue,
};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};
use url::Url;

pub const DRIVER_NAME: &str = "sqlite3";

#[derive(Debug)]
pub enum Sqlite {
    File(PathBuf),
    InMemory,
}

impl Sqlite {
    /// Create a new SQLite driver with an arbitrary connection URL
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url_str = url.into();
        let url = Url::parse(&url_str).map_err(Error::driver)?;

        if url.scheme() != "sqlite" {
            return Err(Error::configuration(format!(
                "connection URL does not have a `sqlite` scheme; url={url_str}"
            )));
        }

        if url.path() == ":memory:" {
            Ok(Self::InMemory)
        } else {
            Ok(Self::File(PathBuf::from(url.path())))
        }
    }

    /// Create an in-memory SQLite database
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    /// Open a SQLite database at the specified file path
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    pub fn connect(&self) -> Result<Connection> {
        match self {
            Sqlite::File(path) => Connection::open(path),
            Sqlite::InMemory => Connection::in_memory(),
        }
    }
}

/// A single SQLite connection shared by every statement and transaction
/// created from it.
#[derive(Debug, Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    connection: RusqliteConnection,
    transactions: TransactionManager,
}

impl Connection {
    pub fn in_memory() -> Result<Self> {
        let connection = RusqliteConnection::open_in_memory().map_err(Error::driver)?;
        Ok(Self::from_rusqlite(connection))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = RusqliteConnection::open(path).map_err(Error::driver)?;
        Ok(Self::from_rusqlite(connection))
    }

    fn from_rusqlite(connection: RusqliteConnection) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    connection,
                    transactions: TransactionManager::new(),
                }),
            }),
        }
    }

    /// Runs one or more `;` separated statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.shared
            .lock()
            .connection
            .execute_batch(sql)
            .map_err(Error::driver)
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves the connection itself usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn statement(self: &Arc<Self>, sql: &str) -> Result<Box<dyn driver::Statement>> {
        // Prepare eagerly so syntax errors surface here.
        self.lock()
            .connection
            .prepare_cached(sql)
            .map_err(Error::driver)?;

        tracing::trace!(sql, "prepared statement");

        Ok(Box::new(Statement {
            shared: self.clone(),
            sql: sql.to_string(),
        }))
    }
}

#[async_trait]
impl driver::Connection for Connection {
    fn driver_name(&self) -> &str {
        DRIVER_NAME
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn driver::Statement>> {
        self.shared.statement(sql)
    }

    async fn begin(&self) -> Result<Arc<dyn driver::Transaction>> {
        let mut state = self.shared.lock();
        let (sql, depth) = state.transactions.start();

        if let Err(err) = state.connection.execute_batch(&sql) {
            state.transactions.rollback();
            return Err(Error::driver(err));
        }

        Ok(Arc::new(Transaction {
            shared: self.shared.clone(),
            depth,
            finished: AtomicBool::new(false),
        }))
    }
}

#[derive(Debug)]
pub struct Transaction {
    shared: Arc<Shared>,
    depth: usize,
    finished: AtomicBool,
}

impl Transaction {
    fn finish(&self, commit: bool) -> Result<()> {
        let mut state = self.shared.lock();
        if self.finished.load(Ordering::SeqCst) {
            return Err(err!("transaction already finished"));
        }
        if state.transactions.depth() != self.depth {
            return Err(err!(
                "transaction at depth {} finished while depth {} is open",
                self.depth,
                state.transactions.depth()
            ));
        }
        self.finished.store(true, Ordering::SeqCst);

        let sql = if commit {
            state.transactions.commit()
        } else {
            state.transactions.rollback()
        };
        state.connection.execute_batch(&sql).map_err(Error::driver)
    }
}

#[async_trait]
impl driver::Transaction for Transaction {
    async fn prepare(&self, sql: &str) -> Result<Box<dyn driver::Statement>> {
        if self.finished.load(Ordering::SeqCst) {
            return Err(err!("transaction already finished"));
        }
        self.shared.statement(sql)
    }

    async fn commit(&self) -> Result<()> {
        self.finish(true)
    }

    async fn rollback(&self) -> Result<()> {
        self.finish(false)
    }
}

struct Statement {
    shared: Arc<Shared>,
    sql: String,
}

#[async_trait]
impl driver::Statement for Statement {
    async fn query(&mut self, args: &[CoreValue]) -> Result<Box<dyn driver::Rows>> {
        let state = self.shared.lock();
        let mut stmt = state
            .connection
            .prepare_cached(&self.sql)
            .map_err(Error::driver)?;

        let column_types: Vec<_> = stmt
            .columns()
            .iter()
            .map(|column| ColumnType::new(column.name(), column.decl_type().unwrap_or_default()))
            .collect();

        let width = column_types.len();
        let mut rows = stmt
            .query(rusqlite::params_from_iter(args.iter().map(Value)))
            .map_err(Error::driver)?;

        let mut values = vec![];
        while let Some(row) = rows.next().map_err(Error::driver)? {
            let mut record = Vec::with_capacity(width);
            for index in 0..width {
                record.push(Value::from_sql(row.get_ref(index).map_err(Error::driver)?));
            }
            values.push(record);
        }

        Ok(Box::new(Rows {
            column_types,
            rows: values.into_iter(),
        }))
    }

    async fn exec(&mut self, args: &[CoreValue]) -> Result<ExecResult> {
        let state = self.shared.lock();
        let mut stmt = state
            .connection
            .prepare_cached(&self.sql)
            .map_err(Error::driver)?;

        let count = stmt
            .execute(rusqlite::params_from_iter(args.iter().map(Value)))
            .map_err(Error::driver)?;

        Ok(ExecResult::new(count as u64).with_last_insert_id(state.connection.last_insert_rowid()))
    }
}

struct Rows {
    column_types: Vec<ColumnType>,
    rows: std::vec::IntoIter<Vec<CoreValue>>,
}

#[async_trait]
impl driver::Rows for Rows {
    fn columns(&self) -> Vec<String> {
        self.column_types.iter().map(|ty| ty.name.clone()).collect()
    }

    fn column_types(&self) -> Option<Vec<ColumnType>> {
        Some(self.column_types.clone())
    }

    async fn next(&mut self, dst: &mut Vec<CoreValue>) -> Result<bool> {
        match self.rows.next() {
            Some(row) => {
                *dst = row;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
