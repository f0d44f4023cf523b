//! PostgreSQL.

use crate::{
    Dialect, Kind, LoadStrategy, MetadataQuery, Placeholder, PresetIdStrategy, Product, Registry,
    UpsertStrategy,
};

pub const NAME: &str = "PostgreSQL";
pub const DRIVER: &str = "postgres";

pub fn product(major: u32, minor: u32) -> Product {
    Product::new(NAME, DRIVER).with_version(major, minor)
}

pub fn register(registry: &Registry) {
    let dialect = |major, minor| {
        Dialect::new(product(major, minor))
            .with_placeholder(Placeholder::Numbered("$"))
            .with_load(LoadStrategy::CopyFromStdin)
            .with_autoincrement(true)
            .with_returning(true)
            .with_preset_id(PresetIdStrategy::Sequence)
    };

    registry.register_dialect(dialect(9, 0));
    registry.register_dialect(dialect(9, 5).with_upsert(UpsertStrategy::OnConflict));

    let q = |kind, sql: &str| MetadataQuery::new(kind, sql, product(9, 0));

    super::add(
        registry,
        [
            q(Kind::Version, "SELECT version()"),
            q(Kind::CurrentCatalog, "SELECT current_database()"),
            q(Kind::CurrentSchema, "SELECT current_schema()"),
            q(Kind::Catalogs, "SELECT datname AS name FROM pg_database WHERE datistemplate = false"),
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
                 ordinal_position AS position, udt_name AS data_type, \
                 character_maximum_length AS data_type_length, numeric_precision, numeric_scale, \
                 is_nullable, column_default, \
                 CASE WHEN column_default LIKE 'nextval(%' OR is_identity = 'YES' THEN 1 ELSE 0 END AS is_autoincrement \
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
                 FROM information_schema.table_constraints c \
                 JOIN information_schema.key_column_usage k \
                 ON k.constraint_name = c.constraint_name AND k.table_schema = c.table_schema \
                 JOIN information_schema.constraint_column_usage u \
                 ON u.constraint_name = c.constraint_name AND u.constraint_schema = c.constraint_schema \
                 WHERE c.constraint_type = 'FOREIGN KEY' $WHERE",
            )
            .with_criteria(&["k.table_catalog", "k.table_schema", "k.table_name"]),
            q(
                Kind::Indexes,
                "SELECT current_database() AS catalog, n.nspname AS schema, t.relname AS table_name, \
                 i.relname AS name, a.attname AS column_name, \
                 array_position(ix.indkey::int2[], a.attnum) AS position, ix.indisunique AS is_unique, \
                 am.amname AS index_type \
                 FROM pg_index ix \
                 JOIN pg_class t ON t.oid = ix.indrelid \
                 JOIN pg_class i ON i.oid = ix.indexrelid \
                 JOIN pg_namespace n ON n.oid = t.relnamespace \
                 JOIN pg_am am ON am.oid = i.relam \
                 JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
                 $WHERE ORDER BY i.relname, position",
            )
            .with_criteria(&["", "n.nspname", "t.relname"]),
            q(
                Kind::Index,
                "SELECT current_database() AS catalog, n.nspname AS schema, t.relname AS table_name, \
                 i.relname AS name, a.attname AS column_name, \
                 array_position(ix.indkey::int2[], a.attnum) AS position, ix.indisunique AS is_unique, \
                 am.amname AS index_type \
                 FROM pg_index ix \
                 JOIN pg_class t ON t.oid = ix.indrelid \
                 JOIN pg_class i ON i.oid = ix.indexrelid \
                 JOIN pg_namespace n ON n.oid = t.relnamespace \
                 JOIN pg_am am ON am.oid = i.relam \
                 JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
                 $WHERE ORDER BY position",
            )
            .with_criteria(&["", "n.nspname", "t.relname", "i.relname"]),
            q(
                Kind::Sequences,
                "SELECT sequence_catalog AS catalog, sequence_schema AS schema, sequence_name AS name, \
                 start_value AS value, increment AS increment_by FROM information_schema.sequences",
            )
            .with_criteria(&["sequence_catalog", "sequence_schema"]),
            q(
                Kind::SequenceNextValue,
                "SELECT nextval('$Args[1].$Args[2]') AS value",
            ),
            q(
                Kind::Functions,
                "SELECT routine_catalog AS catalog, routine_schema AS schema, routine_name AS name, \
                 routine_type, data_type FROM information_schema.routines",
            )
            .with_criteria(&["routine_catalog", "routine_schema"]),
            q(
                Kind::Session,
                "SELECT pid, usename AS username, datname AS catalog, current_schema() AS schema, \
                 application_name AS app_name FROM pg_stat_activity WHERE pid = pg_backend_pid()",
            ),
            q(Kind::FkCheckOn, "SET session_replication_role = DEFAULT"),
            q(Kind::FkCheckOff, "SET session_replication_role = replica"),
        ],
    );

    // Sequences gained last_value in pg_sequences with 10.
    super::add(
        registry,
        [MetadataQuery::new(
            Kind::Sequences,
            "SELECT current_database() AS catalog, schemaname AS schema, sequencename AS name, \
             COALESCE(last_value, start_value) AS value, increment_by FROM pg_sequences",
            product(10, 0),
        )
        .with_criteria(&["", "schemaname"])],
    );
}
