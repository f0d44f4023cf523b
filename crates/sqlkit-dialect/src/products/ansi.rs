//! Fallback product speaking `information_schema`.

use crate::{Dialect, Kind, MetadataQuery, Product, Registry};

pub const NAME: &str = "ANSI";

pub fn product() -> Product {
    Product::new(NAME, "")
}

pub fn register(registry: &Registry) {
    registry.register_product(product());
    registry.register_dialect(Dialect::new(product()));

    let q = |kind, sql: &str| MetadataQuery::new(kind, sql, product());

    super::add(
        registry,
        [
            q(
                Kind::Schemas,
                "SELECT catalog_name AS catalog, schema_name AS name FROM information_schema.schemata",
            )
            .with_criteria(&["catalog_name"]),
            q(
                Kind::Tables,
                "SELECT table_catalog AS catalog, table_schema AS schema, table_name AS name, table_type \
                 FROM information_schema.tables WHERE table_type = 'BASE TABLE'",
            )
            .with_criteria(&["table_catalog", "table_schema"]),
            q(
                Kind::Views,
                "SELECT table_catalog AS catalog, table_schema AS schema, table_name AS name, 'VIEW' AS table_type \
                 FROM information_schema.views",
            )
            .with_criteria(&["table_catalog", "table_schema"]),
            q(
                Kind::Table,
                "SELECT table_catalog AS catalog, table_schema AS schema, table_name, column_name, \
                 ordinal_position AS position, data_type, character_maximum_length AS data_type_length, \
                 numeric_precision, numeric_scale, is_nullable, column_default \
                 FROM information_schema.columns $WHERE ORDER BY ordinal_position",
            )
            .with_criteria(&["table_catalog", "table_schema", "table_name"]),
            q(
                Kind::PrimaryKeys,
                "SELECT k.table_catalog AS catalog, k.table_schema AS schema, k.table_name, \
                 k.constraint_name AS name, k.column_name, k.ordinal_position AS position, 'PRIMARY' AS key_type \
                 FROM information_schema.table_constraints c \
                 JOIN information_schema.key_column_usage k \
                 ON k.constraint_name = c.constraint_name AND k.table_schema = c.table_schema \
                 WHERE c.constraint_type = 'PRIMARY KEY' $WHERE ORDER BY k.ordinal_position",
            )
            .with_criteria(&["k.table_catalog", "k.table_schema", "k.table_name"]),
            q(
                Kind::ForeignKeys,
                "SELECT k.table_catalog AS catalog, k.table_schema AS schema, k.table_name, \
                 k.constraint_name AS name, k.column_name, k.ordinal_position AS position, 'FOREIGN' AS key_type, \
                 u.table_name AS ref_table, u.column_name AS ref_column \
                 FROM information_schema.referential_constraints r \
                 JOIN information_schema.key_column_usage k ON k.constraint_name = r.constraint_name \
                 JOIN information_schema.key_column_usage u ON u.constraint_name = r.unique_constraint_name \
                 AND u.ordinal_position = k.ordinal_position $WHERE",
            )
            .with_criteria(&["k.table_catalog", "k.table_schema", "k.table_name"]),
            q(
                Kind::Sequences,
                "SELECT sequence_catalog AS catalog, sequence_schema AS schema, sequence_name AS name, \
                 start_value AS value, increment AS increment_by FROM information_schema.sequences",
            )
            .with_criteria(&["sequence_catalog", "sequence_schema"]),
            q(
                Kind::Functions,
                "SELECT routine_catalog AS catalog, routine_schema AS schema, routine_name AS name, \
                 routine_type, data_type FROM information_schema.routines",
            )
            .with_criteria(&["routine_catalog", "routine_schema"]),
        ],
    );
}
