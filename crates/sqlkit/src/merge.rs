//! Synchronising a table with a staged set of records.

use crate::{
    field::Fields,
    session::{bind_value, fields_with_identity, Handle, Prepared},
    sql::Upsert,
    Db, Deleter, Inserter, Options, Updater,
};

use sqlkit_core::{Error, Record, Result, Value};
use sqlkit_dialect::{Dialect, UpsertStrategy};

use std::{
    collections::{HashMap, HashSet},
    fmt,
    ops::{BitOr, BitOrAssign},
    time::{Duration, Instant},
};

/// Set of operations a merge applies to the target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeStrategy(u8);

impl MergeStrategy {
    /// Insert staged records whose key is not in the table
    pub const INSERT: MergeStrategy = MergeStrategy(1);

    /// Update rows whose staged record differs
    pub const UPDATE: MergeStrategy = MergeStrategy(1 << 1);

    /// Delete rows whose key is not staged
    pub const DELETE: MergeStrategy = MergeStrategy(1 << 2);

    /// Insert or update through the dialect's native upsert
    pub const UPSERT: MergeStrategy = MergeStrategy(1 << 3);

    pub const fn empty() -> MergeStrategy {
        MergeStrategy(0)
    }

    pub const fn contains(self, other: MergeStrategy) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for MergeStrategy {
    fn default() -> MergeStrategy {
        MergeStrategy::INSERT | MergeStrategy::UPDATE
    }
}

impl BitOr for MergeStrategy {
    type Output = MergeStrategy;

    fn bitor(self, rhs: MergeStrategy) -> MergeStrategy {
        MergeStrategy(self.0 | rhs.0)
    }
}

impl BitOrAssign for MergeStrategy {
    fn bitor_assign(&mut self, rhs: MergeStrategy) {
        self.0 |= rhs.0;
    }
}

/// How a [`Merger`] reconciles staged records with the table.
///
/// ```
/// use sqlkit::{MergeConfig, MergeStrategy};
///
/// let config = MergeConfig::new()
///     .strategy(MergeStrategy::INSERT | MergeStrategy::UPDATE | MergeStrategy::DELETE)
///     .scope("region = 'emea'");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MergeConfig {
    pub(crate) strategy: MergeStrategy,

    /// Predicate limiting the rows of the table taking part in the merge
    pub(crate) scope: Option<String>,

    /// Always decompose into insert, update and delete statements
    pub(crate) no_upsert: bool,
}

impl MergeConfig {
    pub fn new() -> MergeConfig {
        MergeConfig::default()
    }

    pub fn strategy(mut self, strategy: MergeStrategy) -> MergeConfig {
        self.strategy = strategy;
        self
    }

    /// Restricts the merge to the rows matching `predicate`. Rows outside
    /// the scope are neither compared nor deleted.
    pub fn scope(mut self, predicate: impl Into<String>) -> MergeConfig {
        self.scope = Some(predicate.into());
        self
    }

    pub fn no_upsert(mut self, no_upsert: bool) -> MergeConfig {
        self.no_upsert = no_upsert;
        self
    }
}

/// Time spent in one phase of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub name: &'static str,
    pub elapsed: Duration,
}

/// Outcome of a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: u64,
    pub updated: u64,
    pub deleted: u64,
    pub upserted: u64,

    /// Staged records identical to their row
    pub unchanged: u64,

    pub phases: Vec<Phase>,
}

impl MergeReport {
    pub fn total(&self) -> u64 {
        self.inserted + self.updated + self.deleted + self.upserted
    }

    pub fn elapsed(&self) -> Duration {
        self.phases.iter().map(|phase| phase.elapsed).sum()
    }

    fn timed(&mut self, name: &'static str, started: Instant) {
        self.phases.push(Phase {
            name,
            elapsed: started.elapsed(),
        });
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "inserted: {}, updated: {}, deleted: {}, upserted: {}, unchanged: {}",
            self.inserted, self.updated, self.deleted, self.upserted, self.unchanged
        )?;
        for phase in &self.phases {
            write!(f, ", {}: {:?}", phase.name, phase.elapsed)?;
        }
        Ok(())
    }
}

/// Merges staged records of type `T` into a table by their identity.
///
/// With a native upsert available and no delete requested, the merge runs
/// as batched upserts. Otherwise the rows in scope are read, compared with
/// the staged records, and the differences are applied as inserts, updates
/// and deletes. All statements share one transaction.
pub struct Merger<T> {
    db: Db,
    table: String,
    config: MergeConfig,
    inserter: Inserter<T>,
    updater: Updater<T>,
    deleter: Deleter<T>,
}

impl<T: Record> Merger<T> {
    pub fn new(db: Db, table: impl Into<String>, config: MergeConfig) -> Merger<T> {
        let table = table.into();
        Merger {
            inserter: Inserter::new(db.clone(), table.clone()),
            updater: Updater::new(db.clone(), table.clone()),
            deleter: Deleter::new(db.clone(), table.clone()),
            db,
            table,
            config,
        }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub async fn merge(&self, records: &mut [T], options: &Options) -> Result<MergeReport> {
        let strategy = self.config.strategy;
        if strategy.is_empty() {
            return Err(Error::configuration(format!(
                "merge into {} has no strategy",
                self.table
            )));
        }

        let dialect = self.db.dialect(options).await?;
        let (fields, identities) = fields_with_identity::<T>(&self.table)?;
        if identities.is_empty() {
            return Err(Error::missing_identity(&self.table));
        }

        let handle = Handle::begin(self.db.connection(), &dialect, options).await?;
        let joined = handle.join(options);

        let native = !self.config.no_upsert
            && dialect.upsert != UpsertStrategy::Undefined
            && !strategy.contains(MergeStrategy::DELETE)
            && (strategy.contains(MergeStrategy::UPSERT)
                || strategy.contains(MergeStrategy::INSERT | MergeStrategy::UPDATE));

        let res = if native {
            self.upsert(&handle, &fields, &identities, records, &dialect, &joined)
                .await
        } else {
            self.decomposed(&fields, &identities, records, &joined).await
        };
        let res = res.map_err(|e| e.context(sqlkit_core::err!("merge into {} failed", self.table)));

        let report = handle.end(res).await?;
        tracing::debug!(table = %self.table, %report, "merged");
        Ok(report)
    }

    async fn upsert(
        &self,
        handle: &Handle,
        fields: &Fields<T>,
        identities: &[usize],
        records: &[T],
        dialect: &Dialect,
        options: &Options,
    ) -> Result<MergeReport> {
        let started = Instant::now();
        let columns: Vec<String> = fields.data.iter().map(|f| f.column_name()).collect();
        let builder = Upsert::new(
            &self.table,
            &columns,
            identities,
            dialect,
            options.effective_batch_size(),
        )?;

        let mut report = MergeReport::default();
        let mut prepared = None;
        let res = async {
            for batch in records.chunks(builder.batch_size()) {
                if options.is_cancelled() {
                    return Err(Error::cancelled());
                }

                let args: Vec<Value> = batch
                    .iter()
                    .flat_map(|record| {
                        (0..columns.len()).map(move |position| bind_value(fields, record, position))
                    })
                    .collect();
                let stmt = Prepared::ensure(&mut prepared, handle, builder.build(batch.len())).await?;
                report.upserted += options.run(stmt.exec(&args)).await?.rows_affected;
            }
            Ok(())
        }
        .await;
        Prepared::finish(prepared, res).await?;

        report.timed("upsert", started);
        Ok(report)
    }

    async fn decomposed(
        &self,
        fields: &Fields<T>,
        identities: &[usize],
        records: &mut [T],
        options: &Options,
    ) -> Result<MergeReport> {
        let strategy = self.config.strategy;
        let mut report = MergeReport::default();

        let started = Instant::now();
        let existing = self.fetch_existing(fields, identities, options).await?;
        report.timed("fetch", started);

        let mut staged = HashSet::new();
        let mut new = vec![];
        let mut changed = vec![];
        for (i, record) in records.iter().enumerate() {
            let key = key_of(fields, identities, record);
            match existing.get(&key) {
                None => new.push(i),
                Some(row) if differs(fields, record, row) => changed.push(i),
                Some(_) => report.unchanged += 1,
            }
            staged.insert(key);
        }

        let upsert = strategy.contains(MergeStrategy::UPSERT);
        if !new.is_empty() && (upsert || strategy.contains(MergeStrategy::INSERT)) {
            let started = Instant::now();
            let mut batch = take(records, &new);
            let res = self.inserter.insert(&mut batch, options).await;
            restore(records, &new, batch);
            report.inserted = res?.rows_affected;
            report.timed("insert", started);
        }

        if !changed.is_empty() && (upsert || strategy.contains(MergeStrategy::UPDATE)) {
            let started = Instant::now();
            let batch = take(records, &changed);
            let res = self.updater.update(&batch, options).await;
            restore(records, &changed, batch);
            report.updated = res?;
            report.timed("update", started);
        }

        if strategy.contains(MergeStrategy::DELETE) {
            let started = Instant::now();
            let mut missing = vec![];
            for (key, row) in &existing {
                if staged.contains(key) {
                    continue;
                }
                let mut record = T::default();
                for position in identities {
                    fields.data[*position]
                        .accessor
                        .set(&mut record, row[*position].clone())?;
                }
                missing.push(record);
            }
            report.deleted = self.deleter.delete(&missing, options).await?;
            report.timed("delete", started);
        }

        Ok(report)
    }

    /// Rows in scope, keyed by the text of their identity columns.
    async fn fetch_existing(
        &self,
        fields: &Fields<T>,
        identities: &[usize],
        options: &Options,
    ) -> Result<HashMap<String, Vec<Value>>> {
        let columns: Vec<String> = fields.data.iter().map(|f| f.column_name()).collect();
        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), self.table);
        if let Some(scope) = &self.config.scope {
            sql.push_str(" WHERE ");
            sql.push_str(scope);
        }

        // classification needs the live rows
        let mut options = options.clone();
        options.cache = None;

        let mut existing = HashMap::new();
        self.db
            .reader(sql)
            .query_all_with_slice(&[], &options, |row| {
                let key = identities
                    .iter()
                    .map(|i| row.get(*i).map(Value::to_text).unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join("\u{1f}");
                existing.insert(key, row);
                Ok(true)
            })
            .await?;
        Ok(existing)
    }
}

fn key_of<T>(fields: &Fields<T>, identities: &[usize], record: &T) -> String {
    identities
        .iter()
        .map(|i| fields.data[*i].accessor.value(record).to_text())
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

fn differs<T>(fields: &Fields<T>, record: &T, row: &[Value]) -> bool {
    fields.data.iter().enumerate().any(|(i, field)| {
        let staged = field.accessor.value(record);
        let Some(stored) = row.get(i) else {
            return true;
        };
        let stored = stored
            .clone()
            .convert(field.accessor.scan_type())
            .unwrap_or_else(|_| stored.clone());
        staged.is_null() != stored.is_null() || staged.to_text() != stored.to_text()
    })
}

fn take<T: Default>(records: &mut [T], positions: &[usize]) -> Vec<T> {
    positions
        .iter()
        .map(|i| std::mem::take(&mut records[*i]))
        .collect()
}

fn restore<T>(records: &mut [T], positions: &[usize], batch: Vec<T>) {
    for (i, record) in positions.iter().zip(batch) {
        records[*i] = record;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strategy_flags_combine() {
        let strategy = MergeStrategy::INSERT | MergeStrategy::DELETE;
        assert!(strategy.contains(MergeStrategy::INSERT));
        assert!(!strategy.contains(MergeStrategy::UPDATE));
        assert!(!strategy.contains(MergeStrategy::INSERT | MergeStrategy::UPDATE));
        assert!(MergeStrategy::default().contains(MergeStrategy::UPDATE));
        assert!(MergeStrategy::empty().is_empty());
    }

    #[test]
    fn report_renders_counts_and_phases() {
        let report = MergeReport {
            inserted: 2,
            updated: 1,
            phases: vec![Phase {
                name: "fetch",
                elapsed: Duration::from_millis(3),
            }],
            ..MergeReport::default()
        };
        assert_eq!(report.total(), 3);
        assert_eq!(
            report.to_string(),
            "inserted: 2, updated: 1, deleted: 0, upserted: 0, unchanged: 0, fetch: 3ms"
        );
    }
}
