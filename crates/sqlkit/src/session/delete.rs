use super::{bind_value, fields_with_identity, Handle, Memo, Prepared};
use crate::{field::Fields, sql::Delete, Db, Options};

use sqlkit_core::{Error, Record, Result, Value};
use sqlkit_dialect::Product;

struct Plan<T> {
    fields: Fields<T>,
    identities: Vec<usize>,
    builder: Delete,
}

/// Deletes records of type `T` by their identity, in batches.
pub struct Deleter<T> {
    db: Db,
    table: String,
    memo: Memo<(Product, usize), Plan<T>>,
}

impl<T: Record> Deleter<T> {
    pub fn new(db: Db, table: impl Into<String>) -> Deleter<T> {
        Deleter {
            db,
            table: table.into(),
            memo: Memo::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Deletes every record and returns the number of rows affected.
    pub async fn delete(&self, records: &[T], options: &Options) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let dialect = self.db.dialect(options).await?;
        let batch_size = options.effective_batch_size();
        let plan = self
            .memo
            .get_or_try_init((dialect.product.clone(), batch_size), || {
                let (fields, identities) = fields_with_identity::<T>(&self.table)?;
                if identities.is_empty() {
                    return Err(Error::missing_identity(&self.table));
                }

                let keys: Vec<String> = identities
                    .iter()
                    .map(|i| fields.data[*i].column_name())
                    .collect();
                let builder = Delete::new(&self.table, &keys, &dialect, batch_size);
                Ok(Plan {
                    fields,
                    identities,
                    builder,
                })
            })?;

        let handle = Handle::begin(self.db.connection(), &dialect, options).await?;
        let res = self
            .run(&handle, &plan, records, options)
            .await
            .map_err(|e| e.context(sqlkit_core::err!("delete from {} failed", self.table)));
        handle.end(res).await
    }

    async fn run(
        &self,
        handle: &Handle,
        plan: &Plan<T>,
        records: &[T],
        options: &Options,
    ) -> Result<u64> {
        let mut prepared = None;
        let res = async {
            let mut affected = 0;

            for batch in records.chunks(plan.builder.batch_size()) {
                if options.is_cancelled() {
                    return Err(Error::cancelled());
                }

                let args: Vec<Value> = batch
                    .iter()
                    .flat_map(|record| {
                        plan.identities
                            .iter()
                            .map(move |position| bind_value(&plan.fields, record, *position))
                    })
                    .collect();

                let stmt =
                    Prepared::ensure(&mut prepared, handle, plan.builder.build(batch.len())).await?;
                let res = options.run(stmt.exec(&args)).await?;
                tracing::debug!(table = %self.table, rows = res.rows_affected, "flushed delete batch");
                affected += res.rows_affected;
            }

            Ok(affected)
        }
        .await;

        Prepared::finish(prepared, res).await
    }
}
