//! Built-in products.

pub mod ansi;
pub mod bigquery;
pub mod mssql;
pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod snowflake;
pub mod sqlite;
pub mod vertica;

use crate::{MetadataQuery, Registry};

/// Registers every built-in product into `registry`.
pub fn register_all(registry: &Registry) {
    ansi::register(registry);
    bigquery::register(registry);
    mssql::register(registry);
    mysql::register(registry);
    oracle::register(registry);
    postgres::register(registry);
    snowflake::register(registry);
    sqlite::register(registry);
    vertica::register(registry);
}

fn add(registry: &Registry, queries: impl IntoIterator<Item = MetadataQuery>) {
    for query in queries {
        let (kind, product) = (query.kind, query.product.clone());
        if let Err(err) = registry.register_query(query) {
            tracing::warn!(%kind, %product, error = %err, "skipping built-in metadata query");
        }
    }
}
