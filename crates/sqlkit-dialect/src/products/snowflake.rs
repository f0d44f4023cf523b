//! Snowflake.

use crate::{Dialect, Kind, MetadataQuery, Placeholder, PresetIdStrategy, Product, Registry, UpsertStrategy};

pub const NAME: &str = "Snowflake";
pub const DRIVER: &str = "snowflake";

pub fn product(major: u32, minor: u32) -> Product {
    Product::new(NAME, DRIVER).with_version(major, minor)
}

pub fn register(registry: &Registry) {
    registry.register_dialect(
        Dialect::new(product(1, 0))
            .with_placeholder(Placeholder::Fixed("?"))
            .with_upsert(UpsertStrategy::MergeInto)
            .with_autoincrement(true)
            .with_preset_id(PresetIdStrategy::Sequence),
    );

    let q = |kind, sql: &str| MetadataQuery::new(kind, sql, product(1, 0));

    super::add(
        registry,
        [
            q(Kind::Version, "SELECT 'Snowflake ' || CURRENT_VERSION()"),
            q(Kind::CurrentCatalog, "SELECT CURRENT_DATABASE()"),
            q(Kind::CurrentSchema, "SELECT CURRENT_SCHEMA()"),
            q(Kind::Catalogs, "SELECT database_name AS name FROM information_schema.databases"),
            q(
                Kind::Schemas,
                "SELECT catalog_name AS catalog, schema_name AS name FROM $Args[0].information_schema.schemata",
            ),
            q(
                Kind::Tables,
                "SELECT table_catalog AS catalog, table_schema AS schema, table_name AS name, table_type \
                 FROM $Args[0].information_schema.tables WHERE table_type = 'BASE TABLE'",
            )
            .with_criteria(&["", "table_schema"]),
            q(
                Kind::Views,
                "SELECT table_catalog AS catalog, table_schema AS schema, table_name AS name, 'VIEW' AS table_type \
                 FROM $Args[0].information_schema.views",
            )
            .with_criteria(&["", "table_schema"]),
            q(
                Kind::Table,
                "SELECT table_catalog AS catalog, table_schema AS schema, table_name, column_name, \
                 ordinal_position AS position, data_type, character_maximum_length AS data_type_length, \
                 numeric_precision, numeric_scale, is_nullable, column_default \
                 FROM $Args[0].information_schema.columns $WHERE ORDER BY ordinal_position",
            )
            .with_criteria(&["", "table_schema", "table_name"]),
            q(
                Kind::Sequences,
                "SELECT sequence_catalog AS catalog, sequence_schema AS schema, sequence_name AS name, \
                 next_value AS value, increment AS increment_by FROM $Args[0].information_schema.sequences",
            )
            .with_criteria(&["", "sequence_schema"]),
            q(Kind::SequenceNextValue, "SELECT $Args[0].$Args[1].$Args[2].NEXTVAL AS value"),
            q(
                Kind::Functions,
                "SELECT function_catalog AS catalog, function_schema AS schema, function_name AS name, \
                 'FUNCTION' AS routine_type, data_type FROM $Args[0].information_schema.functions",
            )
            .with_criteria(&["", "function_schema"]),
            q(
                Kind::Session,
                "SELECT CURRENT_SESSION() AS pid, CURRENT_USER() AS username, CURRENT_DATABASE() AS catalog, \
                 CURRENT_SCHEMA() AS schema",
            ),
        ],
    );
}
