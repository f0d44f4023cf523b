//! Catalog introspection through the registered metadata queries.

mod sink;
pub use sink::{Catalog, Function, Index, Key, Schema, Session, Sequence, Table, TableColumn};

use crate::{matcher::Discard, Options, RecordMapper};

use sqlkit_core::{Column, Connection, Record, Result, Value};
use sqlkit_dialect::{parse_version, Dialect, Kind, MetadataQuery, Product, Registry, Rowset};

use std::sync::{Arc, Mutex};

/// Runs metadata queries against a connection.
///
/// The product detected for the most recent connection is remembered, so
/// repeated calls with the same connection skip the version query.
#[derive(Debug)]
pub struct Metadata {
    registry: &'static Registry,
    detected: Mutex<Option<(usize, Product)>>,
}

impl Metadata {
    pub fn new(registry: &'static Registry) -> Metadata {
        Metadata {
            registry,
            detected: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &'static Registry {
        self.registry
    }

    /// Product behind `conn`: the one in `options`, else the remembered one,
    /// else the product matched by driver name refined by the version query.
    pub async fn detect_product(&self, conn: &dyn Connection, options: &Options) -> Result<Product> {
        if let Some(product) = &options.product {
            return Ok(product.clone());
        }

        let handle = connection_id(conn);
        if let Some((id, product)) = &*self.lock() {
            if *id == handle {
                return Ok(product.clone());
            }
        }

        let mut product = self.registry.product_for_driver(conn.driver_name());

        match self.registry.lookup(&product, Kind::Version) {
            Ok(query) => match self.fetch(conn, &query, &product, &[], options).await {
                Ok(rowset) => {
                    let banner = first_text(&rowset);
                    let parsed = parse_version(&banner);
                    if !parsed.name.is_empty() {
                        if let Some(named) = self.registry.product(&parsed.name) {
                            product = named;
                        }
                    }
                    product.merge_version(&parsed);
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!(driver = conn.driver_name(), error = %e, "version query failed");
                }
            },
            Err(e) => {
                tracing::debug!(driver = conn.driver_name(), error = %e, "no version query");
            }
        }

        tracing::debug!(%product, version = ?(product.major, product.minor, product.release), "detected product");
        *self.lock() = Some((handle, product.clone()));
        Ok(product)
    }

    /// Dialect of the product behind `conn`.
    pub async fn dialect(&self, conn: &dyn Connection, options: &Options) -> Result<Arc<Dialect>> {
        if let Some(dialect) = &options.dialect {
            return Ok(dialect.clone());
        }
        let product = self.detect_product(conn, options).await?;
        self.registry.dialect(&product)
    }

    /// Runs the query of `kind` with positional `args` and returns its rows.
    pub async fn rows(
        &self,
        conn: &dyn Connection,
        kind: Kind,
        args: &[&str],
        options: &Options,
    ) -> Result<Rowset> {
        let product = self.detect_product(conn, options).await?;
        let query = self.registry.lookup(&product, kind)?;
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        self.fetch(conn, &query, &product, &args, options).await
    }

    /// First cell of the first row as text, or `""` when there are no rows.
    pub async fn string(
        &self,
        conn: &dyn Connection,
        kind: Kind,
        args: &[&str],
        options: &Options,
    ) -> Result<String> {
        let rowset = self.rows(conn, kind, args, options).await?;
        Ok(first_text(&rowset))
    }

    /// First cell of every row as text.
    pub async fn strings(
        &self,
        conn: &dyn Connection,
        kind: Kind,
        args: &[&str],
        options: &Options,
    ) -> Result<Vec<String>> {
        let rowset = self.rows(conn, kind, args, options).await?;
        Ok(rowset
            .rows
            .iter()
            .map(|row| row.first().map(Value::to_text).unwrap_or_default())
            .collect())
    }

    /// Every row scanned into `T`. Columns `T` does not declare are ignored.
    pub async fn records<T: Record>(
        &self,
        conn: &dyn Connection,
        kind: Kind,
        args: &[&str],
        options: &Options,
    ) -> Result<Vec<T>> {
        let rowset = self.rows(conn, kind, args, options).await?;
        let columns = Column::from_names(&rowset.columns);
        let mapper = RecordMapper::<T>::new(&columns, Some(Arc::new(Discard)))?;

        rowset
            .rows
            .into_iter()
            .enumerate()
            .map(|(i, mut row)| mapper.scan(&mut row, i))
            .collect()
    }

    /// First row scanned into `T`.
    pub async fn record<T: Record>(
        &self,
        conn: &dyn Connection,
        kind: Kind,
        args: &[&str],
        options: &Options,
    ) -> Result<Option<T>> {
        Ok(self
            .records(conn, kind, args, options)
            .await?
            .into_iter()
            .next())
    }

    pub async fn version(&self, conn: &dyn Connection, options: &Options) -> Result<String> {
        self.string(conn, Kind::Version, &[], options).await
    }

    pub async fn catalogs(&self, conn: &dyn Connection, options: &Options) -> Result<Vec<Catalog>> {
        self.records(conn, Kind::Catalogs, &[], options).await
    }

    pub async fn current_catalog(&self, conn: &dyn Connection, options: &Options) -> Result<String> {
        self.string(conn, Kind::CurrentCatalog, &[], options).await
    }

    pub async fn current_schema(&self, conn: &dyn Connection, options: &Options) -> Result<String> {
        self.string(conn, Kind::CurrentSchema, &[], options).await
    }

    pub async fn schemas(
        &self,
        conn: &dyn Connection,
        catalog: &str,
        options: &Options,
    ) -> Result<Vec<Schema>> {
        self.records(conn, Kind::Schemas, &[catalog], options).await
    }

    pub async fn tables(
        &self,
        conn: &dyn Connection,
        catalog: &str,
        schema: &str,
        options: &Options,
    ) -> Result<Vec<Table>> {
        self.records(conn, Kind::Tables, &[catalog, schema], options)
            .await
    }

    pub async fn views(
        &self,
        conn: &dyn Connection,
        catalog: &str,
        schema: &str,
        options: &Options,
    ) -> Result<Vec<Table>> {
        self.records(conn, Kind::Views, &[catalog, schema], options)
            .await
    }

    /// Columns of `table`, in position order.
    pub async fn columns(
        &self,
        conn: &dyn Connection,
        catalog: &str,
        schema: &str,
        table: &str,
        options: &Options,
    ) -> Result<Vec<TableColumn>> {
        self.records(conn, Kind::Table, &[catalog, schema, table], options)
            .await
    }

    pub async fn primary_keys(
        &self,
        conn: &dyn Connection,
        catalog: &str,
        schema: &str,
        table: &str,
        options: &Options,
    ) -> Result<Vec<Key>> {
        self.records(conn, Kind::PrimaryKeys, &[catalog, schema, table], options)
            .await
    }

    pub async fn foreign_keys(
        &self,
        conn: &dyn Connection,
        catalog: &str,
        schema: &str,
        table: &str,
        options: &Options,
    ) -> Result<Vec<Key>> {
        self.records(conn, Kind::ForeignKeys, &[catalog, schema, table], options)
            .await
    }

    pub async fn indexes(
        &self,
        conn: &dyn Connection,
        catalog: &str,
        schema: &str,
        table: &str,
        options: &Options,
    ) -> Result<Vec<Index>> {
        self.records(conn, Kind::Indexes, &[catalog, schema, table], options)
            .await
    }

    /// Columns of the index named `index`.
    pub async fn index(
        &self,
        conn: &dyn Connection,
        catalog: &str,
        schema: &str,
        table: &str,
        index: &str,
        options: &Options,
    ) -> Result<Vec<Index>> {
        self.records(conn, Kind::Index, &[catalog, schema, table, index], options)
            .await
    }

    pub async fn sequences(
        &self,
        conn: &dyn Connection,
        catalog: &str,
        schema: &str,
        options: &Options,
    ) -> Result<Vec<Sequence>> {
        self.records(conn, Kind::Sequences, &[catalog, schema], options)
            .await
    }

    /// Next value `sequence` will hand out.
    pub async fn sequence_next_value(
        &self,
        conn: &dyn Connection,
        catalog: &str,
        schema: &str,
        sequence: &str,
        options: &Options,
    ) -> Result<i64> {
        let rowset = self
            .rows(conn, Kind::SequenceNextValue, &[catalog, schema, sequence], options)
            .await?;
        let value = rowset
            .rows
            .first()
            .and_then(|row| row.first())
            .cloned()
            .unwrap_or(Value::Null);

        match value.convert(&sqlkit_core::ScanType::I64)? {
            Value::I64(next) => Ok(next),
            _ => Ok(1),
        }
    }

    pub async fn functions(
        &self,
        conn: &dyn Connection,
        catalog: &str,
        schema: &str,
        options: &Options,
    ) -> Result<Vec<Function>> {
        self.records(conn, Kind::Functions, &[catalog, schema], options)
            .await
    }

    pub async fn sessions(&self, conn: &dyn Connection, options: &Options) -> Result<Vec<Session>> {
        self.records(conn, Kind::Session, &[], options).await
    }

    /// Turns foreign key enforcement on or off.
    pub async fn fk_check(&self, conn: &dyn Connection, on: bool, options: &Options) -> Result<()> {
        let kind = if on { Kind::FkCheckOn } else { Kind::FkCheckOff };
        self.rows(conn, kind, &[], options).await?;
        Ok(())
    }

    async fn fetch(
        &self,
        conn: &dyn Connection,
        query: &MetadataQuery,
        product: &Product,
        args: &[String],
        options: &Options,
    ) -> Result<Rowset> {
        let mut rowset = Rowset::default();

        for handler in &query.pre {
            if !handler.handle(conn, args, &mut rowset).await? {
                return Ok(rowset);
            }
        }

        let dialect = match &options.dialect {
            Some(dialect) => dialect.clone(),
            None => self
                .registry
                .dialect(product)
                .unwrap_or_else(|_| Arc::new(Dialect::new(product.clone()))),
        };
        let rendered = query.render(&dialect, args);
        tracing::debug!(kind = %query.kind, sql = %rendered.sql, "metadata query");

        rowset = options
            .run(async {
                let mut stmt = conn.prepare(&rendered.sql).await?;
                let mut rows = stmt.query(&rendered.args).await?;

                let mut rowset = Rowset {
                    columns: rows.columns(),
                    rows: vec![],
                };
                let mut row = vec![];
                while rows.next(&mut row).await? {
                    rowset.rows.push(std::mem::take(&mut row));
                }

                rows.close().await?;
                stmt.close().await?;
                Ok(rowset)
            })
            .await
            .map_err(|e| e.context(sqlkit_core::err!("metadata query {} failed", query.kind)))?;

        for handler in &query.post {
            if !handler.handle(conn, args, &mut rowset).await? {
                break;
            }
        }

        Ok(rowset)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<(usize, Product)>> {
        self.detected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn connection_id(conn: &dyn Connection) -> usize {
    conn as *const dyn Connection as *const () as usize
}

fn first_text(rowset: &Rowset) -> String {
    rowset
        .rows
        .first()
        .and_then(|row| row.first())
        .map(Value::to_text)
        .unwrap_or_default()
}
