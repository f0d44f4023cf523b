use crate::Options;

use sqlkit_core::{
    driver::{Statement, Transaction},
    Connection, Result,
};
use sqlkit_dialect::Dialect;

use std::sync::Arc;

/// Where a session's statements run: a transaction or the bare connection.
#[derive(Debug)]
pub(crate) struct Handle {
    conn: Arc<dyn Connection>,
    tx: Option<Arc<dyn Transaction>>,

    /// The transaction was opened here and is finished here
    owned: bool,
}

impl Handle {
    /// Attaches the caller's transaction, or opens a local one when the
    /// dialect is transactional.
    pub(crate) async fn begin(
        conn: &Arc<dyn Connection>,
        dialect: &Dialect,
        options: &Options,
    ) -> Result<Handle> {
        if let Some(tx) = &options.transaction {
            return Ok(Handle {
                conn: conn.clone(),
                tx: Some(tx.clone()),
                owned: false,
            });
        }

        let tx = if dialect.transactional {
            Some(options.run(conn.begin()).await?)
        } else {
            None
        };

        Ok(Handle {
            conn: conn.clone(),
            owned: tx.is_some(),
            tx,
        })
    }

    pub(crate) async fn prepare(&self, sql: &str) -> Result<Box<dyn Statement>> {
        match &self.tx {
            Some(tx) => tx.prepare(sql).await,
            None => self.conn.prepare(sql).await,
        }
    }

    pub(crate) fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    /// `options` bound to this handle's transaction, so nested sessions
    /// join it instead of opening their own.
    pub(crate) fn join(&self, options: &Options) -> Options {
        match &self.tx {
            Some(tx) => options.clone().transaction(tx.clone()),
            None => options.clone(),
        }
    }

    /// Commits an owned transaction on success and rolls it back on error.
    /// A failed rollback is annotated onto the original error.
    pub(crate) async fn end<R>(self, res: Result<R>) -> Result<R> {
        let Some(tx) = self.tx.filter(|_| self.owned) else {
            return res;
        };

        match res {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(error = %e, "rolling back");
                match tx.rollback().await {
                    Ok(()) => Err(e),
                    Err(rollback) => {
                        tracing::warn!(error = %rollback, "rollback failed");
                        Err(e.with_rollback_failure(rollback))
                    }
                }
            }
        }
    }
}
