//! Read cache.
//!
//! A [`Cache`] stores the rows of a query under a key derived from the
//! normalised SQL text and its arguments. [`Cache::get`] either hands out a
//! readable entry, makes the caller the single writer of a new entry, or
//! reports that another writer is in flight. A writer entry must be finished
//! with [`Cache::close`] or [`Cache::rollback`]; until then it is invisible to
//! other callers.

mod file;
pub use file::{FileCache, FileCacheConfig};

mod index;
pub use index::IndexedQuery;

mod kv;
pub use kv::{KvCache, KvCacheConfig, KvRecord, KvStore, MemoryStore};

mod recorder;
pub use recorder::{MemoryRecorder, Recorder};

use sqlkit_core::{async_trait, err, Column, Connection, Result, ScanType, Value};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use std::{any::Any, fmt::Debug, time::Duration};

/// Outcome of a cache lookup.
#[derive(Debug)]
pub enum Lookup {
    /// A complete, valid entry to read rows from
    Hit(Entry),

    /// The caller now owns the single-flight lock and must fill the entry
    Miss(Entry),

    /// Another writer is filling the entry; read from the database instead
    InUse,
}

/// Read cache backend contract.
#[async_trait]
pub trait Cache: Debug + Send + Sync {
    async fn get(&self, sql: &str, args: &[Value]) -> Result<Lookup>;

    /// Records the result-set columns on a writer entry.
    async fn assign_columns(&self, entry: &mut Entry, columns: &[Column]) -> Result<()> {
        entry.meta.fields = columns.iter().map(FieldDescriptor::from).collect();
        Ok(())
    }

    /// Appends one row to a writer entry.
    async fn add_values(&self, entry: &mut Entry, values: &[Value]) -> Result<()>;

    /// Reads the next row of a reader entry.
    async fn next(&self, entry: &mut Entry) -> Result<Option<Vec<Value>>>;

    /// Initialises the entry's scan types from the first row, or checks a row
    /// against them. Returns `false` on mismatch; the caller then drops the
    /// entry and reads from the database.
    async fn update_type(&self, entry: &mut Entry, values: &[Value]) -> Result<bool> {
        Ok(entry.meta.update_types(values))
    }

    /// Publishes a writer entry. Idempotent; a no-op for readers.
    async fn close(&self, entry: &mut Entry) -> Result<()>;

    /// Discards a writer entry's partial state. Rolling back a closed writer
    /// deletes it.
    async fn rollback(&self, entry: &mut Entry) -> Result<()>;

    /// Removes the entry and every chunk it links to.
    async fn delete(&self, entry: &mut Entry) -> Result<()>;

    /// Materialises every row of `sql` so later [`IndexedQuery`] lookups by
    /// `column` can be served from the cache. Returns the number of rows
    /// stored.
    async fn index_by(
        &self,
        conn: &dyn Connection,
        column: &str,
        sql: &str,
        args: &[Value],
    ) -> Result<u64> {
        index::index_by(self, conn, column, sql, args).await
    }

    /// Columns and rows of an indexed query, or `None` when the superset
    /// result is not cached.
    async fn get_indexed(&self, query: &IndexedQuery) -> Result<Option<(Vec<Column>, Vec<Vec<Value>>)>> {
        index::get_indexed(self, query).await
    }
}

/// Whether an entry is read from or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Reader,
    Writer,
}

/// One cached result set.
pub struct Entry {
    pub meta: Meta,
    key: String,
    mode: Mode,
    row_added: bool,
    finished: bool,
    state: Option<Box<dyn Any + Send + Sync>>,
}

impl core::fmt::Debug for Entry {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("mode", &self.mode)
            .field("row_added", &self.row_added)
            .field("finished", &self.finished)
            .finish()
    }
}

impl Entry {
    pub fn reader(key: impl Into<String>, meta: Meta, state: impl Any + Send + Sync) -> Entry {
        Entry::new(key.into(), meta, Mode::Reader, Box::new(state))
    }

    pub fn writer(key: impl Into<String>, meta: Meta, state: impl Any + Send + Sync) -> Entry {
        Entry::new(key.into(), meta, Mode::Writer, Box::new(state))
    }

    fn new(key: String, meta: Meta, mode: Mode, state: Box<dyn Any + Send + Sync>) -> Entry {
        Entry {
            meta,
            key,
            mode,
            row_added: false,
            finished: false,
            state: Some(state),
        }
    }

    /// Canonical key of the entry.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_readable(&self) -> bool {
        self.mode == Mode::Reader
    }

    pub fn is_writable(&self) -> bool {
        self.mode == Mode::Writer
    }

    /// A row was added to this writer.
    pub fn has_rows(&self) -> bool {
        self.row_added
    }

    pub fn mark_row_added(&mut self) {
        self.row_added = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn mark_finished(&mut self) {
        self.finished = true;
    }

    /// Backend state of the entry.
    pub fn state_mut<S: Any>(&mut self) -> Result<&mut S> {
        self.state
            .as_mut()
            .and_then(|state| state.downcast_mut::<S>())
            .ok_or_else(|| err!("cache entry {} has no {} state", self.key, std::any::type_name::<S>()))
    }

    /// Takes the backend state out of the entry.
    pub fn take_state<S: Any>(&mut self) -> Option<S> {
        let state = self.state.take()?;
        match state.downcast::<S>() {
            Ok(state) => Some(*state),
            Err(state) => {
                self.state = Some(state);
                None
            }
        }
    }

    /// Result-set columns recorded in the entry.
    pub fn columns(&self) -> Vec<Column> {
        self.meta.columns()
    }
}

/// Header of a cached result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(rename = "SQL")]
    pub sql: String,

    /// Arguments encoded as a JSON array
    #[serde(rename = "Args")]
    pub args: String,

    /// Scan type of each column
    #[serde(rename = "Types", default)]
    pub types: Vec<ScanType>,

    #[serde(rename = "Signature", default)]
    pub signature: String,

    /// Time to live in nanoseconds, `0` for no expiry
    #[serde(rename = "TTL", default)]
    pub ttl: u64,

    /// Creation time in nanoseconds since the Unix epoch
    #[serde(rename = "Created", default)]
    pub created: i64,

    #[serde(rename = "Fields", default)]
    pub fields: Vec<FieldDescriptor>,
}

/// Column description stored with a cached result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "DatabaseType", default)]
    pub database_type: String,

    #[serde(rename = "ScanType", default, skip_serializing_if = "Option::is_none")]
    pub scan_type: Option<ScanType>,

    #[serde(rename = "Nullable", default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

impl From<&Column> for FieldDescriptor {
    fn from(column: &Column) -> FieldDescriptor {
        FieldDescriptor {
            name: column.name().to_string(),
            database_type: column.database_type().to_string(),
            scan_type: column.scan_type().cloned(),
            nullable: column.nullable(),
        }
    }
}

impl Meta {
    pub fn new(sql: &str, args: &[Value], signature: &str, ttl: Duration) -> Meta {
        Meta {
            sql: normalise_sql(sql),
            args: encode_args(args),
            types: vec![],
            signature: signature.to_string(),
            ttl: u64::try_from(ttl.as_nanos()).unwrap_or(u64::MAX),
            created: now_nanos(),
            fields: vec![],
        }
    }

    /// Returns `true` when the entry outlived its TTL.
    pub fn is_expired(&self) -> bool {
        if self.ttl == 0 {
            return false;
        }
        let age = now_nanos().saturating_sub(self.created);
        age < 0 || age as u64 > self.ttl
    }

    /// Returns `true` when the entry was written for `sql` and `args` under
    /// `signature` and is still fresh.
    pub fn is_valid_for(&self, sql: &str, args: &[Value], signature: &str) -> bool {
        self.signature == signature
            && !self.is_expired()
            && self.sql == normalise_sql(sql)
            && self.args == encode_args(args)
    }

    pub fn columns(&self) -> Vec<Column> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let mut column = Column::new(&field.name)
                    .with_database_type(&field.database_type)
                    .with_ordinal(i);
                if let Some(scan_type) = self.types.get(i).or(field.scan_type.as_ref()) {
                    column = column.with_scan_type(scan_type.clone());
                }
                if let Some(nullable) = field.nullable {
                    column = column.with_nullable(nullable);
                }
                column
            })
            .collect()
    }

    /// See [`Cache::update_type`].
    pub fn update_types(&mut self, values: &[Value]) -> bool {
        if self.types.is_empty() {
            self.types = values.iter().map(Value::scan_type).collect();
            return true;
        }

        if self.types.len() != values.len() {
            return false;
        }

        for (ty, value) in self.types.iter_mut().zip(values) {
            if value.is_null() {
                continue;
            }
            match ty {
                ScanType::Any => *ty = value.scan_type(),
                ty if ty.matches(&value.scan_type()) => {}
                _ => return false,
            }
        }
        true
    }

    /// Encodes a row as a JSON array line.
    pub fn encode_row(values: &[Value]) -> Result<String> {
        let row: Vec<_> = values.iter().map(Value::to_json).collect();
        Ok(serde_json::to_string(&row)?)
    }

    /// Decodes a row stored by [`Meta::encode_row`].
    pub fn decode_row(&self, line: &str) -> Result<Vec<Value>> {
        let cells: Vec<serde_json::Value> = serde_json::from_str(line)?;
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| Value::from_json(cell, self.types.get(i).unwrap_or(&ScanType::Any)))
            .collect()
    }
}

/// Cache key of a query: the SHA-256 of the normalised SQL and encoded
/// arguments, hex encoded, with a `.json` suffix.
pub fn key(sql: &str, args: &[Value]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalise_sql(sql).as_bytes());
    hasher.update(b"\n");
    hasher.update(encode_args(args).as_bytes());
    format!("{}.json", hex::encode(hasher.finalize()))
}

/// Collapses whitespace runs so formatting changes do not change the key.
pub fn normalise_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn encode_args(args: &[Value]) -> String {
    serde_json::Value::Array(args.iter().map(Value::to_json).collect()).to_string()
}

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn key_ignores_whitespace() {
        let a = key("SELECT *\n  FROM t WHERE id = ?", &[Value::I64(1)]);
        let b = key("SELECT * FROM t WHERE id = ?", &[Value::I64(1)]);
        let c = key("SELECT * FROM t WHERE id = ?", &[Value::I64(2)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.ends_with(".json"));
    }

    #[test]
    fn types_initialise_then_check() {
        let mut meta = Meta::new("SELECT 1", &[], "", Duration::ZERO);
        assert!(meta.update_types(&[Value::I64(1), Value::Null]));
        assert!(meta.update_types(&[Value::I64(2), Value::from("x")]));
        assert_eq!(meta.types, [ScanType::I64, ScanType::String]);
        assert!(!meta.update_types(&[Value::from("y"), Value::from("x")]));
    }

    #[test]
    fn rows_round_trip_through_types() {
        let mut meta = Meta::new("SELECT 1", &[], "", Duration::ZERO);
        let row = [Value::I64(1), Value::Bytes(vec![1, 2]), Value::Null];
        meta.update_types(&row);

        let line = Meta::encode_row(&row).unwrap();
        assert_eq!(meta.decode_row(&line).unwrap(), row);
    }

    #[test]
    fn expiry() {
        let mut meta = Meta::new("SELECT 1", &[], "", Duration::from_secs(60));
        assert!(!meta.is_expired());
        meta.created -= 61_000_000_000;
        assert!(meta.is_expired());
        assert!(!meta.is_valid_for("SELECT 1", &[], ""));
        meta.created = now_nanos();
        assert!(meta.is_valid_for("SELECT  1", &[], ""));
        assert!(!meta.is_valid_for("SELECT 1", &[], "v2"));
    }
}
