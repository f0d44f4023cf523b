mod builder;
pub use builder::Builder;

use crate::{
    Deleter, Inserter, LoadConfig, Loader, MergeConfig, Merger, Metadata, Options, Reader, Updater,
    Validator,
};

use sqlkit_core::{
    driver::{ExecResult, Transaction},
    Connection, Record, Result, Value,
};
use sqlkit_dialect::{Dialect, Product, Registry};

use std::sync::Arc;

/// Shared state between all `Db` clones.
pub(crate) struct Shared {
    pub(crate) connection: Arc<dyn Connection>,
    pub(crate) metadata: Metadata,

    /// Product pinned at build time, skipping detection
    pub(crate) product: Option<Product>,
}

/// A database handle.
///
/// `Db` pairs a driver connection with the dialect registry. Cloning is cheap
/// and every clone shares the detected product.
#[derive(Clone)]
pub struct Db {
    shared: Arc<Shared>,
}

impl Db {
    /// A handle over `connection` using the process-wide registry.
    pub fn new(connection: impl Connection) -> Db {
        Db::builder().build(Arc::new(connection))
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.shared.connection
    }

    pub fn registry(&self) -> &'static Registry {
        self.shared.metadata.registry()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.shared.metadata
    }

    /// Product behind the connection.
    pub async fn product(&self, options: &Options) -> Result<Product> {
        if let (None, Some(product)) = (&options.product, &self.shared.product) {
            return Ok(product.clone());
        }
        self.shared
            .metadata
            .detect_product(self.shared.connection.as_ref(), options)
            .await
    }

    /// Dialect of the product behind the connection.
    pub async fn dialect(&self, options: &Options) -> Result<Arc<Dialect>> {
        if let Some(dialect) = &options.dialect {
            return Ok(dialect.clone());
        }
        let product = self.product(options).await?;
        self.registry().dialect(&product)
    }

    /// Starts a transaction to pass to sessions through
    /// [`Options::transaction`].
    pub async fn begin(&self) -> Result<Arc<dyn Transaction>> {
        self.shared.connection.begin().await
    }

    /// Runs `sql` for its side effects, inside the transaction of `options`
    /// when one is set.
    pub async fn exec(&self, sql: &str, args: &[Value], options: &Options) -> Result<ExecResult> {
        tracing::debug!(sql, "exec");
        options
            .run(async {
                let mut stmt = match &options.transaction {
                    Some(tx) => tx.prepare(sql).await?,
                    None => self.shared.connection.prepare(sql).await?,
                };
                let res = stmt.exec(args).await;
                stmt.close().await?;
                res
            })
            .await
    }

    pub fn reader(&self, sql: impl Into<String>) -> Reader {
        Reader::new(self.clone(), sql)
    }

    pub fn inserter<T: Record>(&self, table: impl Into<String>) -> Inserter<T> {
        Inserter::new(self.clone(), table)
    }

    pub fn updater<T: Record>(&self, table: impl Into<String>) -> Updater<T> {
        Updater::new(self.clone(), table)
    }

    pub fn deleter<T: Record>(&self, table: impl Into<String>) -> Deleter<T> {
        Deleter::new(self.clone(), table)
    }

    pub fn merger<T: Record>(&self, table: impl Into<String>, config: MergeConfig) -> Merger<T> {
        Merger::new(self.clone(), table, config)
    }

    pub fn loader<T: Record>(&self, table: impl Into<String>, config: LoadConfig) -> Loader<T> {
        Loader::new(self.clone(), table, config)
    }

    pub fn validator(&self) -> Validator {
        Validator::new(self.clone())
    }
}

impl core::fmt::Debug for Db {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Db")
            .field("connection", &self.shared.connection)
            .field("product", &self.shared.product)
            .finish()
    }
}
