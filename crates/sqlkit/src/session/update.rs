use super::{bind_value, fields_with_identity, Handle, Memo, Prepared};
use crate::{field::Fields, sql::Update, Db, Options, Presence};

use sqlkit_core::{Error, Record, Result, Value};
use sqlkit_dialect::Product;

struct Plan<T> {
    fields: Fields<T>,
    presence: Option<Presence<T>>,
    builder: Update,

    /// Data field position of each set column, in `SET` order
    set_positions: Vec<usize>,

    identities: Vec<usize>,
}

/// Updates records of type `T` by their identity.
///
/// With a presence marker on `T`, each row's `SET` list holds only the
/// fields flagged as set; rows with no set field are skipped.
pub struct Updater<T> {
    db: Db,
    table: String,
    memo: Memo<Product, Plan<T>>,
}

impl<T: Record> Updater<T> {
    pub fn new(db: Db, table: impl Into<String>) -> Updater<T> {
        Updater {
            db,
            table: table.into(),
            memo: Memo::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Updates every record and returns the number of rows affected.
    pub async fn update(&self, records: &[T], options: &Options) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let dialect = self.db.dialect(options).await?;
        let plan = self.memo.get_or_try_init(dialect.product.clone(), || {
            let (fields, identities) = fields_with_identity::<T>(&self.table)?;
            if identities.is_empty() {
                return Err(Error::missing_identity(&self.table));
            }

            let presence = Presence::from_fields(&fields)?;
            let columns: Vec<String> = fields.data.iter().map(|f| f.column_name()).collect();
            let builder = Update::new(&self.table, &columns, &identities, &dialect);
            let set_positions = (0..columns.len())
                .filter(|i| !identities.contains(i))
                .collect();

            Ok(Plan {
                fields,
                presence,
                builder,
                set_positions,
                identities,
            })
        })?;

        let handle = Handle::begin(self.db.connection(), &dialect, options).await?;
        let res = self
            .run(&handle, &plan, records, options)
            .await
            .map_err(|e| e.context(sqlkit_core::err!("update of {} failed", self.table)));
        handle.end(res).await
    }

    async fn run(
        &self,
        handle: &Handle,
        plan: &Plan<T>,
        records: &[T],
        options: &Options,
    ) -> Result<u64> {
        let restricted = options.columns.as_ref().map(|names| {
            plan.builder
                .set_columns()
                .iter()
                .map(|column| names.iter().any(|name| name.eq_ignore_ascii_case(column)))
                .collect::<Vec<_>>()
        });

        let mut prepared = None;
        let res = async {
            let mut affected = 0;

            for record in records {
                if options.is_cancelled() {
                    return Err(Error::cancelled());
                }

                let mask: Vec<bool> = plan
                    .set_positions
                    .iter()
                    .enumerate()
                    .map(|(i, position)| {
                        let present = options.ignore_presence
                            || plan
                                .presence
                                .as_ref()
                                .map_or(true, |presence| presence.is_field_set(record, *position));
                        let selected = restricted.as_ref().map_or(true, |mask| mask[i]);
                        present && selected
                    })
                    .collect();

                let sql = plan.builder.build(&mask);
                if sql.is_empty() {
                    tracing::trace!(table = %self.table, "no field set, skipping row");
                    continue;
                }

                let args: Vec<Value> = plan
                    .set_positions
                    .iter()
                    .zip(&mask)
                    .filter(|(_, set)| **set)
                    .map(|(position, _)| *position)
                    .chain(plan.identities.iter().copied())
                    .map(|position| bind_value(&plan.fields, record, position))
                    .collect();

                let stmt = Prepared::ensure(&mut prepared, handle, sql).await?;
                let res = options.run(stmt.exec(&args)).await?;
                affected += res.rows_affected;
            }

            tracing::debug!(table = %self.table, affected, "updated rows");
            Ok(affected)
        }
        .await;

        Prepared::finish(prepared, res).await
    }
}
