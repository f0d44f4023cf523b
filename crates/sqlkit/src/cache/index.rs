use super::{normalise_sql, Cache, Entry, Lookup};

use sqlkit_core::{Column, Connection, Error, Result, Value};

use std::collections::{HashMap, HashSet};

/// A lookup of the rows of a materialised query whose `by` column holds one
/// of `values`, served from a result stored by [`Cache::index_by`].
///
/// ```
/// use sqlkit::{cache::IndexedQuery, Value};
///
/// let query = IndexedQuery::new("SELECT * FROM events", "unk")
///     .with_values(vec![Value::from("101"), Value::from("102")])
///     .with_limit(2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedQuery {
    pub sql: String,
    pub args: Vec<Value>,

    /// Indexed column
    pub by: String,

    /// Wanted values of the indexed column
    pub values: Vec<Value>,

    /// Maximum rows per value
    pub limit: Option<usize>,
}

impl IndexedQuery {
    pub fn new(sql: impl Into<String>, by: impl Into<String>) -> IndexedQuery {
        IndexedQuery {
            sql: sql.into(),
            by: by.into(),
            ..IndexedQuery::default()
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> IndexedQuery {
        self.args = args;
        self
    }

    pub fn with_values(mut self, values: Vec<Value>) -> IndexedQuery {
        self.values = values;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> IndexedQuery {
        self.limit = Some(limit);
        self
    }

    /// Keeps the rows of `rows` this query selects, in their original order.
    pub fn filter(&self, columns: &[Column], rows: Vec<Vec<Value>>) -> Result<Vec<Vec<Value>>> {
        let position = position(columns, &self.by)?;
        let wanted: HashSet<String> = self.values.iter().map(Value::to_text).collect();
        let mut taken: HashMap<String, usize> = HashMap::new();

        Ok(rows
            .into_iter()
            .filter(|row| {
                let key = row.get(position).map(Value::to_text).unwrap_or_default();
                if !wanted.contains(&key) {
                    return false;
                }
                let count = taken.entry(key).or_default();
                if self.limit.is_some_and(|limit| *count >= limit) {
                    return false;
                }
                *count += 1;
                true
            })
            .collect())
    }
}

/// SQL under which the materialised result of `sql` is stored.
pub(crate) fn index_sql(sql: &str, column: &str) -> String {
    format!("{} /* index by {column} */", normalise_sql(sql))
}

pub(super) async fn index_by<C: Cache + ?Sized>(
    cache: &C,
    conn: &dyn Connection,
    column: &str,
    sql: &str,
    args: &[Value],
) -> Result<u64> {
    let key_sql = index_sql(sql, column);

    let mut entry = match cache.get(&key_sql, args).await? {
        Lookup::Miss(entry) => entry,
        Lookup::Hit(mut stale) => {
            cache.delete(&mut stale).await?;
            match cache.get(&key_sql, args).await? {
                Lookup::Miss(entry) => entry,
                _ => return Ok(0),
            }
        }
        Lookup::InUse => return Ok(0),
    };

    match fill(cache, &mut entry, conn, column, sql, args).await {
        Ok(count) => {
            cache.close(&mut entry).await?;
            tracing::debug!(column, count, "materialised indexed result");
            Ok(count)
        }
        Err(e) => {
            if let Err(rollback) = cache.rollback(&mut entry).await {
                tracing::warn!(error = %rollback, "failed to roll back cache entry");
            }
            Err(e)
        }
    }
}

async fn fill<C: Cache + ?Sized>(
    cache: &C,
    entry: &mut Entry,
    conn: &dyn Connection,
    column: &str,
    sql: &str,
    args: &[Value],
) -> Result<u64> {
    let mut stmt = conn.prepare(sql).await?;
    let mut rows = stmt.query(args).await?;

    let columns = match rows.column_types() {
        Some(types) => Column::from_driver_types(&types),
        None => Column::from_names(&rows.columns()),
    };
    position(&columns, column)?;
    cache.assign_columns(entry, &columns).await?;

    let mut row = vec![];
    let mut count = 0;
    while rows.next(&mut row).await? {
        cache.add_values(entry, &row).await?;
        count += 1;
    }

    rows.close().await?;
    stmt.close().await?;
    Ok(count)
}

pub(super) async fn get_indexed<C: Cache + ?Sized>(
    cache: &C,
    query: &IndexedQuery,
) -> Result<Option<(Vec<Column>, Vec<Vec<Value>>)>> {
    let mut entry = match cache.get(&index_sql(&query.sql, &query.by), &query.args).await? {
        Lookup::Hit(entry) => entry,
        Lookup::Miss(mut entry) => {
            cache.rollback(&mut entry).await?;
            return Ok(None);
        }
        Lookup::InUse => return Ok(None),
    };

    let mut rows = vec![];
    while let Some(row) = cache.next(&mut entry).await? {
        rows.push(row);
    }
    let columns = entry.columns();
    cache.close(&mut entry).await?;

    let rows = query.filter(&columns, rows)?;
    Ok(Some((columns, rows)))
}

fn position(columns: &[Column], name: &str) -> Result<usize> {
    columns
        .iter()
        .position(|column| column.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            Error::configuration(format!("index column {name} is not in the result set"))
        })
}
