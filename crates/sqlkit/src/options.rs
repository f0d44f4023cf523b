use crate::{matcher::Resolver, Cache};

use sqlkit_core::{driver::Transaction, Error, Result};
use sqlkit_dialect::{Dialect, PresetIdStrategy, Product};
use tokio_util::sync::CancellationToken;

use std::{future::Future, sync::Arc};

/// Rows per statement used when no batch size is given.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Options shared by readers and sessions.
///
/// ```
/// use sqlkit::Options;
///
/// let options = Options::new().batch_size(50).no_returning(true);
/// ```
#[derive(Clone, Default)]
pub struct Options {
    pub(crate) batch_size: Option<usize>,
    pub(crate) transaction: Option<Arc<dyn Transaction>>,
    pub(crate) product: Option<Product>,
    pub(crate) dialect: Option<Arc<Dialect>>,
    pub(crate) ignore_presence: bool,
    pub(crate) resolver: Option<Arc<dyn Resolver>>,
    pub(crate) cache: Option<Arc<dyn Cache>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) preset_id: Option<PresetIdStrategy>,
    pub(crate) columns: Option<Vec<String>>,
    pub(crate) no_returning: bool,
}

impl Options {
    pub fn new() -> Options {
        Options::default()
    }

    /// Maximum rows per statement.
    pub fn batch_size(mut self, batch_size: usize) -> Options {
        self.batch_size = Some(batch_size.max(1));
        self
    }

    /// Runs inside a caller-owned transaction. The caller commits or rolls
    /// it back.
    pub fn transaction(mut self, transaction: Arc<dyn Transaction>) -> Options {
        self.transaction = Some(transaction);
        self
    }

    /// Skips product detection.
    pub fn product(mut self, product: Product) -> Options {
        self.product = Some(product);
        self
    }

    /// Skips dialect lookup.
    pub fn dialect(mut self, dialect: Arc<Dialect>) -> Options {
        self.dialect = Some(dialect);
        self
    }

    /// Treats every field as set, even when the record has a presence
    /// marker.
    pub fn ignore_presence(mut self, ignore: bool) -> Options {
        self.ignore_presence = ignore;
        self
    }

    /// Receives columns that match no record field.
    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Options {
        self.resolver = Some(resolver);
        self
    }

    /// Read cache consulted by readers.
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Options {
        self.cache = Some(cache);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Options {
        self.cancel = token;
        self
    }

    /// Overrides the dialect's strategy for assigning identities the database
    /// does not generate.
    pub fn preset_id(mut self, strategy: PresetIdStrategy) -> Options {
        self.preset_id = Some(strategy);
        self
    }

    /// Restricts updates to the named columns.
    pub fn columns<S: AsRef<str>>(mut self, columns: &[S]) -> Options {
        self.columns = Some(columns.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    /// Reads generated identities back through the last insert id even when
    /// the dialect supports `RETURNING`.
    pub fn no_returning(mut self, no_returning: bool) -> Options {
        self.no_returning = no_returning;
        self
    }

    pub(crate) fn effective_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Races `future` against the cancellation token.
    pub(crate) async fn run<T>(&self, future: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::cancelled()),
            res = future => res,
        }
    }
}

impl core::fmt::Debug for Options {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Options")
            .field("batch_size", &self.batch_size)
            .field("transaction", &self.transaction.is_some())
            .field("product", &self.product)
            .field("dialect", &self.dialect.as_ref().map(|d| &d.product))
            .field("ignore_presence", &self.ignore_presence)
            .field("resolver", &self.resolver.is_some())
            .field("cache", &self.cache.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("preset_id", &self.preset_id)
            .field("columns", &self.columns)
            .field("no_returning", &self.no_returning)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_token_wins() {
        let token = CancellationToken::new();
        let options = Options::new().cancellation(token.clone());
        token.cancel();

        let res = options.run(async { Ok(1) }).await;
        assert!(res.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn completes_without_cancellation() {
        let options = Options::new().batch_size(0);
        assert_eq!(options.effective_batch_size(), 1);
        assert_eq!(options.run(async { Ok(1) }).await.unwrap(), 1);
    }
}
