//! Query execution with row mapping and optional read caching.

use crate::{
    cache::{Entry, IndexedQuery, Lookup},
    Cache, Db, GenericMapper, Options, RecordMapper,
};

use indexmap::IndexMap;
use sqlkit_core::{Column, Record, Result, Value};

/// Per-row callback of the streaming core: receives the result-set columns,
/// the row (to drain) and its ordinal. Returning `false` stops the read.
type RowFn<'a> = dyn FnMut(&[Column], &mut Vec<Value>, usize) -> Result<bool> + Send + 'a;

/// Runs one query and maps its rows.
///
/// Column metadata comes from the driver when it reports column types and
/// from the column names otherwise. When [`Options::cache`] is set, results
/// are served from and stored into the cache.
///
/// ```no_run
/// # async fn demo(db: sqlkit::Db) -> sqlkit::Result<()> {
/// use sqlkit::{Options, Value};
///
/// #[derive(Debug, Default, sqlkit::Record)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// let reader = db.reader("SELECT id, name FROM users WHERE id > ?");
/// let users: Vec<User> = reader.query_records(&[Value::I64(10)], &Options::new()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Reader {
    db: Db,
    sql: String,
}

impl Reader {
    pub fn new(db: Db, sql: impl Into<String>) -> Reader {
        Reader {
            db,
            sql: sql.into(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Scans the first row, if any, into `T`.
    pub async fn query_one<T: Record>(&self, args: &[Value], options: &Options) -> Result<Option<T>> {
        let mut first = None;
        self.query_all(args, options, |record: T| {
            first = Some(record);
            Ok(false)
        })
        .await?;
        Ok(first)
    }

    /// Scans every row into `T` and hands it to `emit`. Reading stops early
    /// when `emit` returns `false`.
    pub async fn query_all<T, F>(&self, args: &[Value], options: &Options, mut emit: F) -> Result<()>
    where
        T: Record,
        F: FnMut(T) -> Result<bool> + Send,
    {
        let mut mapper: Option<RecordMapper<T>> = None;
        let resolver = options.resolver.clone();

        self.stream(args, options, &mut |columns, row, ordinal| {
            if mapper.is_none() {
                mapper = Some(RecordMapper::new(columns, resolver.clone())?);
            }
            match &mapper {
                Some(mapper) => emit(mapper.scan(row, ordinal)?),
                None => Ok(false),
            }
        })
        .await
    }

    /// Every row scanned into `T`.
    pub async fn query_records<T: Record>(&self, args: &[Value], options: &Options) -> Result<Vec<T>> {
        let mut records = vec![];
        self.query_all(args, options, |record| {
            records.push(record);
            Ok(true)
        })
        .await?;
        Ok(records)
    }

    /// Hands every row to `emit` as a slice of values converted to the
    /// holder type of their column.
    pub async fn query_all_with_slice<F>(&self, args: &[Value], options: &Options, mut emit: F) -> Result<()>
    where
        F: FnMut(Vec<Value>) -> Result<bool> + Send,
    {
        let mut mapper: Option<GenericMapper> = None;
        self.stream(args, options, &mut |columns, row, _| {
            let mapper = mapper.get_or_insert_with(|| GenericMapper::new(columns));
            emit(mapper.scan_slice(row))
        })
        .await
    }

    /// Hands every row to `emit` as a map keyed by column name, in column
    /// order.
    pub async fn query_all_with_map<F>(&self, args: &[Value], options: &Options, mut emit: F) -> Result<()>
    where
        F: FnMut(IndexMap<String, Value>) -> Result<bool> + Send,
    {
        let mut mapper: Option<GenericMapper> = None;
        self.stream(args, options, &mut |columns, row, _| {
            let mapper = mapper.get_or_insert_with(|| GenericMapper::new(columns));
            emit(mapper.scan_map(row))
        })
        .await
    }

    /// Rows of `query` scanned into `T`.
    ///
    /// The rows come from a result materialised with [`Cache::index_by`]
    /// when the cache holds one. Otherwise the full query runs against the
    /// database and is filtered the same way.
    pub async fn query_indexed<T: Record>(&self, query: &IndexedQuery, options: &Options) -> Result<Vec<T>> {
        let cached = match &options.cache {
            Some(cache) => options.run(cache.get_indexed(query)).await?,
            None => None,
        };

        let (columns, rows) = match cached {
            Some(found) => {
                tracing::debug!(sql = %query.sql, by = %query.by, "indexed query served from cache");
                found
            }
            None => {
                let reader = Reader::new(self.db.clone(), query.sql.clone());
                let mut columns = vec![];
                let mut rows = vec![];
                reader
                    .read_driver(&query.args, options, None, &mut |cols, row, _| {
                        if columns.is_empty() {
                            columns = cols.to_vec();
                        }
                        rows.push(std::mem::take(row));
                        Ok(true)
                    })
                    .await?;
                if rows.is_empty() {
                    return Ok(vec![]);
                }
                let rows = query.filter(&columns, rows)?;
                (columns, rows)
            }
        };

        let mapper = RecordMapper::<T>::new(&columns, options.resolver.clone())?;
        rows.into_iter()
            .enumerate()
            .map(|(i, mut row)| mapper.scan(&mut row, i))
            .collect()
    }

    async fn stream(&self, args: &[Value], options: &Options, each: &mut RowFn<'_>) -> Result<()> {
        let Some(cache) = options.cache.clone() else {
            return self.read_driver(args, options, None, each).await.map(|_| ());
        };

        match options.run(cache.get(&self.sql, args)).await? {
            Lookup::Hit(mut entry) => {
                match read_cached(cache.as_ref(), &mut entry, options, each).await {
                    Ok(true) => return Ok(()),
                    Ok(false) => {
                        tracing::debug!(sql = %self.sql, "cached types changed, reading from database");
                        if let Err(e) = cache.delete(&mut entry).await {
                            tracing::warn!(error = %e, "failed to delete mismatched cache entry");
                        }
                    }
                    Err(e) => return Err(e),
                }
                self.read_driver(args, options, None, each).await.map(|_| ())
            }
            Lookup::Miss(mut entry) => {
                tracing::debug!(sql = %self.sql, "cache miss");
                let res = self
                    .read_driver(args, options, Some((cache.as_ref(), &mut entry)), each)
                    .await;

                match &res {
                    // abandoned while reading
                    _ if entry.is_finished() => {}
                    Ok(true) => {
                        if let Err(e) = cache.close(&mut entry).await {
                            tracing::warn!(error = %e, "failed to finalise cache entry");
                        }
                    }
                    _ => {
                        if let Err(e) = cache.rollback(&mut entry).await {
                            tracing::warn!(error = %e, "failed to roll back cache entry");
                        }
                    }
                }
                res.map(|_| ())
            }
            Lookup::InUse => {
                tracing::debug!(sql = %self.sql, "cache entry in use, reading from database");
                self.read_driver(args, options, None, each).await.map(|_| ())
            }
        }
    }

    /// Reads from the database, copying every row into `tee` first. A row
    /// whose types differ from the earlier rows rolls the `tee` entry back;
    /// the read itself carries on. Returns `false` when `each` stopped the
    /// read before the rows ran out.
    async fn read_driver(
        &self,
        args: &[Value],
        options: &Options,
        mut tee: Option<(&dyn Cache, &mut Entry)>,
        each: &mut RowFn<'_>,
    ) -> Result<bool> {
        tracing::debug!(sql = %self.sql, "query");
        let conn = self.db.connection();

        let mut stmt = options
            .run(async {
                match &options.transaction {
                    Some(tx) => tx.prepare(&self.sql).await,
                    None => conn.prepare(&self.sql).await,
                }
            })
            .await?;

        let res = async {
            let mut rows = options.run(stmt.query(args)).await?;
            let columns = match rows.column_types() {
                Some(types) => Column::from_driver_types(&types),
                None => Column::from_names(&rows.columns()),
            };
            if let Some((cache, entry)) = &mut tee {
                cache.assign_columns(entry, &columns).await?;
            }

            let mut row = vec![];
            let mut ordinal = 0;
            let mut complete = true;
            while options.run(rows.next(&mut row)).await? {
                let mut abandon = false;
                if let Some((cache, entry)) = &mut tee {
                    match cache.add_values(entry, &row).await {
                        Ok(()) => {}
                        Err(e) if e.is_cache_mismatch() => {
                            tracing::debug!(key = entry.key(), error = %e, "abandoning cache entry");
                            if let Err(e) = cache.rollback(entry).await {
                                tracing::warn!(error = %e, "failed to roll back cache entry");
                            }
                            abandon = true;
                        }
                        Err(e) => return Err(e),
                    }
                }
                if abandon {
                    tee = None;
                }
                tracing::trace!(ordinal, "row");
                if !each(&columns, &mut row, ordinal)? {
                    complete = false;
                    break;
                }
                ordinal += 1;
            }

            rows.close().await?;
            Ok(complete)
        }
        .await;

        let closed = stmt.close().await;
        let complete = res?;
        closed?;
        Ok(complete)
    }
}

/// Streams a readable entry. Returns `false` without emitting anything when
/// the first row's types no longer match the entry.
async fn read_cached(
    cache: &dyn Cache,
    entry: &mut Entry,
    options: &Options,
    each: &mut RowFn<'_>,
) -> Result<bool> {
    tracing::debug!(key = entry.key(), "cache hit");
    let columns = entry.columns();

    let res = async {
        let mut ordinal = 0;
        while let Some(mut row) = options.run(cache.next(entry)).await? {
            if ordinal == 0 && !cache.update_type(entry, &row).await? {
                return Ok(false);
            }
            if !each(&columns, &mut row, ordinal)? {
                break;
            }
            ordinal += 1;
        }
        Ok::<bool, sqlkit_core::Error>(true)
    }
    .await;

    match res {
        Ok(false) => Ok(false),
        res => {
            let closed = cache.close(entry).await;
            let res = res?;
            closed?;
            Ok(res)
        }
    }
}
