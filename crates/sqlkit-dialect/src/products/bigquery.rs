//! Google BigQuery.

use crate::{Dialect, Kind, MetadataQuery, NamePrefix, Placeholder, PresetIdStrategy, Product, Registry, UpsertStrategy};

pub const NAME: &str = "BigQuery";
pub const DRIVER: &str = "bigquery";

pub fn product(major: u32, minor: u32) -> Product {
    Product::new(NAME, DRIVER).with_version(major, minor)
}

pub fn register(registry: &Registry) {
    registry.register_dialect(
        Dialect::new(product(2, 0))
            .with_placeholder(Placeholder::Fixed("?"))
            .with_quote('`')
            .with_transactional(false)
            .with_upsert(UpsertStrategy::MergeInto)
            .with_preset_id(PresetIdStrategy::Max),
    );

    let q = |kind, sql: &str| MetadataQuery::new(kind, sql, product(2, 0));

    super::add(
        registry,
        [
            q(Kind::Version, "SELECT '2.0'").with_post(NamePrefix(NAME)),
            q(Kind::CurrentCatalog, "SELECT @@project_id"),
            q(
                Kind::Schemas,
                "SELECT catalog_name AS catalog, schema_name AS name FROM $Args[0].INFORMATION_SCHEMA.SCHEMATA",
            ),
            q(
                Kind::Tables,
                "SELECT table_catalog AS catalog, table_schema AS schema, table_name AS name, table_type \
                 FROM $Args[0].$Args[1].INFORMATION_SCHEMA.TABLES WHERE table_type = 'BASE TABLE'",
            ),
            q(
                Kind::Views,
                "SELECT table_catalog AS catalog, table_schema AS schema, table_name AS name, 'VIEW' AS table_type \
                 FROM $Args[0].$Args[1].INFORMATION_SCHEMA.VIEWS",
            ),
            q(
                Kind::Table,
                "SELECT table_catalog AS catalog, table_schema AS schema, table_name, column_name, \
                 ordinal_position AS position, data_type, is_nullable \
                 FROM $Args[0].$Args[1].INFORMATION_SCHEMA.COLUMNS $WHERE ORDER BY ordinal_position",
            )
            .with_criteria(&["", "", "table_name"]),
            q(
                Kind::Functions,
                "SELECT routine_catalog AS catalog, routine_schema AS schema, routine_name AS name, \
                 routine_type, data_type FROM $Args[0].$Args[1].INFORMATION_SCHEMA.ROUTINES",
            ),
            q(Kind::Session, "SELECT @@session_id AS pid, SESSION_USER() AS username"),
        ],
    );
}
