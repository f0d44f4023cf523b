//! Insert, update and delete sessions.
//!
//! A session is created per table and record type. Each call resolves the
//! dialect, opens a local transaction when the dialect is transactional and
//! no transaction was passed in, runs its batches, and commits or rolls back.

mod delete;
pub use delete::Deleter;

mod handle;
pub(crate) use handle::Handle;

mod insert;
pub use insert::{InsertOutcome, Inserter};

mod update;
pub use update::Updater;

use crate::field::Fields;

use sqlkit_core::{driver::Statement, err, Error, Record, Result, Value};

use std::sync::{Arc, Mutex};

/// Statement prepared for the SQL of the current batch shape.
pub(crate) struct Prepared {
    sql: String,
    stmt: Box<dyn Statement>,
}

impl Prepared {
    /// Returns the statement for `sql`, closing and re-preparing when the
    /// previous batch used different SQL.
    pub(crate) async fn ensure<'a>(
        prepared: &'a mut Option<Prepared>,
        handle: &Handle,
        sql: String,
    ) -> Result<&'a mut Box<dyn Statement>> {
        if !prepared.as_ref().is_some_and(|p| p.sql == sql) {
            if let Some(mut previous) = prepared.take() {
                previous.stmt.close().await?;
            }

            tracing::debug!(sql = %sql, "preparing statement");
            let stmt = handle.prepare(&sql).await?;
            return Ok(&mut prepared.insert(Prepared { sql, stmt }).stmt);
        }

        match prepared {
            Some(p) => Ok(&mut p.stmt),
            None => Err(err!("statement for {sql} is not prepared")),
        }
    }

    /// Closes the statement, keeping the first error of `res` and `close`.
    pub(crate) async fn finish<R>(prepared: Option<Prepared>, res: Result<R>) -> Result<R> {
        let closed = match prepared {
            Some(mut p) => p.stmt.close().await,
            None => Ok(()),
        };
        match (res, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close)) => {
                tracing::warn!(error = %close, "failed to close statement");
                Err(e)
            }
        }
    }
}

/// Single-slot memo of the plan built for the most recent session key.
pub(crate) struct Memo<K, P> {
    slot: Mutex<Option<(K, Arc<P>)>>,
}

impl<K: PartialEq, P> Memo<K, P> {
    pub(crate) fn new() -> Memo<K, P> {
        Memo {
            slot: Mutex::new(None),
        }
    }

    pub(crate) fn get_or_try_init(&self, key: K, init: impl FnOnce() -> Result<P>) -> Result<Arc<P>> {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some((cached, plan)) = &*slot {
            if *cached == key {
                return Ok(plan.clone());
            }
        }

        let plan = Arc::new(init()?);
        *slot = Some((key, plan.clone()));
        Ok(plan)
    }
}

/// Data fields of `T` and the positions of its identity fields.
pub(crate) fn fields_with_identity<T: Record>(table: &str) -> Result<(Fields<T>, Vec<usize>)> {
    let fields = Fields::<T>::of()?;
    if fields.data.is_empty() {
        return Err(Error::configuration(format!("no columns to write to {table}")));
    }

    let mut identities = fields.identities();
    if identities.is_empty() {
        if let Some(id) = fields
            .data
            .iter()
            .position(|field| field.column_name().eq_ignore_ascii_case("id"))
        {
            identities.push(id);
        }
    }
    Ok((fields, identities))
}

/// Value bound for the data field at `position` of `record`.
pub(crate) fn bind_value<T>(fields: &Fields<T>, record: &T, position: usize) -> Value {
    let field = &fields.data[position];
    let value = field.accessor.value(record);
    if field.tag.nullify_empty && value.is_zero() {
        Value::Null
    } else {
        value
    }
}
