//! Vertica.

use crate::{
    Dialect, InsertStrategy, Kind, LoadStrategy, MetadataQuery, Placeholder, PresetIdStrategy,
    Product, Registry, UpsertStrategy,
};

pub const NAME: &str = "Vertica";
pub const DRIVER: &str = "vertica";

pub fn product(major: u32, minor: u32) -> Product {
    Product::new(NAME, DRIVER).with_version(major, minor)
}

pub fn register(registry: &Registry) {
    registry.register_dialect(
        Dialect::new(product(7, 0))
            .with_placeholder(Placeholder::Fixed("?"))
            .with_insert(InsertStrategy::SingleValues)
            .with_upsert(UpsertStrategy::MergeInto)
            .with_load(LoadStrategy::CopyFromStdin)
            .with_autoincrement(true)
            .with_preset_id(PresetIdStrategy::Max),
    );

    let q = |kind, sql: &str| MetadataQuery::new(kind, sql, product(7, 0));

    super::add(
        registry,
        [
            q(Kind::Version, "SELECT version()"),
            q(Kind::CurrentCatalog, "SELECT CURRENT_DATABASE()"),
            q(Kind::CurrentSchema, "SELECT CURRENT_SCHEMA()"),
            q(Kind::Catalogs, "SELECT database_name AS name FROM v_catalog.databases"),
            q(Kind::Schemas, "SELECT '' AS catalog, schema_name AS name FROM v_catalog.schemata"),
            q(
                Kind::Tables,
                "SELECT '' AS catalog, table_schema AS schema, table_name AS name, 'BASE TABLE' AS table_type \
                 FROM v_catalog.tables",
            )
            .with_criteria(&["", "table_schema"]),
            q(
                Kind::Views,
                "SELECT '' AS catalog, table_schema AS schema, table_name AS name, 'VIEW' AS table_type \
                 FROM v_catalog.views",
            )
            .with_criteria(&["", "table_schema"]),
            q(
                Kind::Table,
                "SELECT table_schema AS schema, table_name, column_name, ordinal_position AS position, \
                 data_type, character_maximum_length AS data_type_length, numeric_precision, numeric_scale, \
                 CASE WHEN is_nullable THEN 'YES' ELSE 'NO' END AS is_nullable, column_default, \
                 CASE WHEN is_identity THEN 1 ELSE 0 END AS is_autoincrement \
                 FROM v_catalog.columns $WHERE ORDER BY ordinal_position",
            )
            .with_criteria(&["", "table_schema", "table_name"]),
            q(
                Kind::PrimaryKeys,
                "SELECT table_schema AS schema, table_name, constraint_name AS name, column_name, \
                 ordinal_position AS position, 'PRIMARY' AS key_type \
                 FROM v_catalog.primary_keys $WHERE ORDER BY ordinal_position",
            )
            .with_criteria(&["", "table_schema", "table_name"]),
            q(
                Kind::ForeignKeys,
                "SELECT table_schema AS schema, table_name, constraint_name AS name, column_name, \
                 ordinal_position AS position, 'FOREIGN' AS key_type, reference_table_name AS ref_table, \
                 reference_column_name AS ref_column FROM v_catalog.foreign_keys",
            )
            .with_criteria(&["", "table_schema", "table_name"]),
            q(
                Kind::Sequences,
                "SELECT '' AS catalog, sequence_schema AS schema, sequence_name AS name, \
                 current_value AS value, increment_by FROM v_catalog.sequences",
            )
            .with_criteria(&["", "sequence_schema"]),
            q(Kind::SequenceNextValue, "SELECT NEXTVAL('$Args[1].$Args[2]') AS value"),
            q(
                Kind::Session,
                "SELECT session_id AS pid, user_name AS username, current_schema() AS schema \
                 FROM v_monitor.current_session",
            ),
        ],
    );
}
