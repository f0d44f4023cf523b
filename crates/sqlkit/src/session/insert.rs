use super::{bind_value, fields_with_identity, Handle, Memo, Prepared};
use crate::{field::Fields, sql::Insert, Db, Options};

use sqlkit_core::{Error, Record, Result, ScanType, Value};
use sqlkit_dialect::{Dialect, InsertStrategy, LastInsertIdMode, PresetIdStrategy, Product};

/// Totals of an insert call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub rows_affected: u64,

    /// Identity assigned to the last inserted row, when the database
    /// reported one
    pub last_insert_id: Option<i64>,
}

/// How the identity column takes part in an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdentityMode {
    /// Every identity is supplied by the caller, or there is none
    Supplied,

    /// Every identity is zero and generated by the database; the column is
    /// left out of the statement
    Generated,

    /// Some identities are zero; those are bound as NULL and generated
    Mixed,
}

#[derive(Debug, PartialEq)]
struct PlanKey {
    product: Product,
    batch_size: usize,
    mode: IdentityMode,
    returning: bool,
}

struct Plan<T> {
    fields: Fields<T>,
    identity: Option<usize>,

    /// Data field positions bound per row, in column order
    bound: Vec<usize>,

    builder: Insert,
    mode: IdentityMode,
    returning: bool,
}

/// Inserts records of type `T` into a table, in batches.
///
/// Identities generated by the database are written back into the records,
/// through `RETURNING` when the dialect supports it and through the last
/// insert id otherwise.
pub struct Inserter<T> {
    db: Db,
    table: String,
    memo: Memo<PlanKey, Plan<T>>,
}

impl<T: Record> Inserter<T> {
    pub fn new(db: Db, table: impl Into<String>) -> Inserter<T> {
        Inserter {
            db,
            table: table.into(),
            memo: Memo::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Inserts `records`, assigning generated or preset identities to them.
    pub async fn insert(&self, records: &mut [T], options: &Options) -> Result<InsertOutcome> {
        if records.is_empty() {
            return Ok(InsertOutcome::default());
        }

        let dialect = self.db.dialect(options).await?;
        let (fields, identities) = fields_with_identity::<T>(&self.table)?;
        let identity = identities.first().copied();

        let mode = match identity {
            Some(id) => identity_mode(&fields, id, records, &dialect),
            None => IdentityMode::Supplied,
        };
        let returning = mode != IdentityMode::Supplied
            && dialect.can_returning
            && !options.no_returning;

        let mut batch_size = options.effective_batch_size();
        if dialect.insert == InsertStrategy::SingleValues
            || (mode == IdentityMode::Mixed && !returning)
        {
            batch_size = 1;
        }

        let key = PlanKey {
            product: dialect.product.clone(),
            batch_size,
            mode,
            returning,
        };
        let plan = self.memo.get_or_try_init(key, || {
            Ok(self.plan(fields, identity, mode, returning, &dialect, batch_size))
        })?;

        let handle = Handle::begin(self.db.connection(), &dialect, options).await?;
        let res = async {
            if let (Some(id), IdentityMode::Supplied) = (plan.identity, plan.mode) {
                self.preset_identities(&handle, &plan.fields, id, records, &dialect, options)
                    .await?;
            }
            self.run(&handle, &plan, records, &dialect, options).await
        }
        .await
        .map_err(|e| e.context(sqlkit_core::err!("insert into {} failed", self.table)));

        handle.end(res).await
    }

    fn plan(
        &self,
        fields: Fields<T>,
        identity: Option<usize>,
        mode: IdentityMode,
        returning: bool,
        dialect: &Dialect,
        batch_size: usize,
    ) -> Plan<T> {
        let bound: Vec<usize> = (0..fields.data.len())
            .filter(|i| mode != IdentityMode::Generated || Some(*i) != identity)
            .collect();
        let columns: Vec<String> = bound
            .iter()
            .map(|i| fields.data[*i].column_name())
            .collect();

        let builder = match (returning, identity) {
            (true, Some(id)) => Insert::returning(
                &self.table,
                &columns,
                &fields.data[id].column_name(),
                dialect,
                batch_size,
            ),
            _ => Insert::new(&self.table, &columns, dialect, batch_size),
        };
        tracing::debug!(table = %self.table, ?mode, returning, batch_size, "built insert plan");

        Plan {
            fields,
            identity,
            bound,
            builder,
            mode,
            returning,
        }
    }

    /// Assigns ascending identities to records whose identity is zero, when
    /// the options or the dialect name a preset strategy.
    async fn preset_identities(
        &self,
        handle: &Handle,
        fields: &Fields<T>,
        id: usize,
        records: &mut [T],
        dialect: &Dialect,
        options: &Options,
    ) -> Result<()> {
        let field = &fields.data[id];
        if !records.iter().any(|r| field.accessor.value(r).is_zero()) {
            return Ok(());
        }

        let strategy = options.preset_id.unwrap_or(dialect.preset_id);
        let mut next = match strategy {
            PresetIdStrategy::Undefined => return Ok(()),
            PresetIdStrategy::Max => {
                let sql = format!(
                    "SELECT COALESCE(MAX({}),0) FROM {}",
                    field.column_name(),
                    self.table
                );
                max_identity(handle, &sql, options).await? + 1
            }
            PresetIdStrategy::Sequence => {
                let sequence = field.tag.sequence.as_deref().unwrap_or(&self.table);
                self.db
                    .metadata()
                    .sequence_next_value(handle.connection().as_ref(), "", "", sequence, options)
                    .await?
            }
        };

        tracing::debug!(table = %self.table, ?strategy, first = next, "presetting identities");
        for record in records.iter_mut() {
            if field.accessor.value(record).is_zero() {
                field.accessor.set(record, Value::I64(next))?;
                next += 1;
            }
        }
        Ok(())
    }

    async fn run(
        &self,
        handle: &Handle,
        plan: &Plan<T>,
        records: &mut [T],
        dialect: &Dialect,
        options: &Options,
    ) -> Result<InsertOutcome> {
        let mut prepared = None;
        let res = async {
            let mut outcome = InsertOutcome::default();

            for batch in records.chunks_mut(plan.builder.batch_size()) {
                if options.is_cancelled() {
                    return Err(Error::cancelled());
                }

                let args = self.bind(plan, batch);
                let stmt =
                    Prepared::ensure(&mut prepared, handle, plan.builder.build(batch.len()))
                        .await?;

                if plan.returning {
                    let ids = options
                        .run(async {
                            let mut rows = stmt.query(&args).await?;
                            let mut ids = Vec::with_capacity(batch.len());
                            let mut row = vec![];
                            while rows.next(&mut row).await? {
                                ids.push(row.first().cloned().unwrap_or(Value::Null));
                            }
                            rows.close().await?;
                            Ok(ids)
                        })
                        .await?;

                    outcome.rows_affected += ids.len() as u64;
                    if let Some(last) = ids.last().and_then(Value::as_i64) {
                        outcome.last_insert_id = Some(last);
                    }
                    self.write_back(plan, batch, ids)?;
                } else {
                    let res = options.run(stmt.exec(&args)).await?;
                    tracing::debug!(table = %self.table, rows = res.rows_affected, "flushed insert batch");
                    outcome.rows_affected += res.rows_affected;

                    if let Some(last) = res.last_insert_id {
                        outcome.last_insert_id = Some(last);
                        if plan.mode != IdentityMode::Supplied && dialect.can_last_insert_id {
                            let ids = generated_ids(last, batch.len(), dialect.last_insert_id_mode);
                            self.write_back(plan, batch, ids)?;
                        }
                    }
                }
            }

            Ok(outcome)
        }
        .await;

        Prepared::finish(prepared, res).await
    }

    fn bind(&self, plan: &Plan<T>, batch: &[T]) -> Vec<Value> {
        let mut args = Vec::with_capacity(batch.len() * plan.bound.len());
        for record in batch {
            for position in &plan.bound {
                let value = bind_value(&plan.fields, record, *position);
                if plan.mode == IdentityMode::Mixed && Some(*position) == plan.identity && value.is_zero() {
                    args.push(Value::Null);
                } else {
                    args.push(value);
                }
            }
        }
        args
    }

    /// Stores `ids` into the identities of `batch`, one per row in order.
    /// Rows that carried their own identity keep it.
    fn write_back(&self, plan: &Plan<T>, batch: &mut [T], ids: Vec<Value>) -> Result<()> {
        let Some(id) = plan.identity else {
            return Ok(());
        };
        let field = &plan.fields.data[id];

        for (record, value) in batch.iter_mut().zip(ids) {
            if value.is_null() || !field.accessor.value(record).is_zero() {
                continue;
            }
            field.accessor.set(record, value)?;
        }
        Ok(())
    }
}

fn identity_mode<T>(fields: &Fields<T>, id: usize, records: &[T], dialect: &Dialect) -> IdentityMode {
    let field = &fields.data[id];
    if !field.tag.autoincrement || !dialect.can_autoincrement {
        return IdentityMode::Supplied;
    }

    let zeros = records
        .iter()
        .filter(|r| field.accessor.value(r).is_zero())
        .count();
    match zeros {
        0 => IdentityMode::Supplied,
        n if n == records.len() => IdentityMode::Generated,
        _ => IdentityMode::Mixed,
    }
}

/// Identities of a batch of `count` rows given the driver-reported id.
fn generated_ids(reported: i64, count: usize, mode: LastInsertIdMode) -> Vec<Value> {
    let count = count as i64;
    let first = match mode {
        LastInsertIdMode::First => reported,
        LastInsertIdMode::Last => reported - count + 1,
    };
    (first..first + count).map(Value::I64).collect()
}

async fn max_identity(handle: &Handle, sql: &str, options: &Options) -> Result<i64> {
    options
        .run(async {
            let mut stmt = handle.prepare(sql).await?;
            let mut rows = stmt.query(&[]).await?;
            let mut row = vec![];
            let max = if rows.next(&mut row).await? {
                row.first().cloned().unwrap_or(Value::Null)
            } else {
                Value::Null
            };
            rows.close().await?;
            stmt.close().await?;

            match max.convert(&ScanType::I64)? {
                Value::I64(max) => Ok(max),
                _ => Ok(0),
            }
        })
        .await
}
