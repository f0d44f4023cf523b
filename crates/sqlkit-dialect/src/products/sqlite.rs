//! SQLite.

use crate::{
    Dialect, Kind, LastInsertIdMode, LoadStrategy, MetadataQuery, NamePrefix, Placeholder, Product,
    Registry, StaticRows, UpsertStrategy,
};

pub const NAME: &str = "SQLite";
pub const DRIVER: &str = "sqlite3";

pub fn product(major: u32, minor: u32) -> Product {
    Product::new(NAME, DRIVER).with_version(major, minor)
}

fn dialect(major: u32, minor: u32) -> Dialect {
    Dialect::new(product(major, minor))
        .with_placeholder(Placeholder::Fixed("?"))
        .with_load(LoadStrategy::Undefined)
        .with_autoincrement(true)
        .with_last_insert_id(true, LastInsertIdMode::Last)
}

pub fn register(registry: &Registry) {
    registry.register_dialect(dialect(3, 0));
    registry.register_dialect(dialect(3, 24).with_upsert(UpsertStrategy::OnConflict));
    registry.register_dialect(
        dialect(3, 35)
            .with_upsert(UpsertStrategy::OnConflict)
            .with_returning(true),
    );

    let q = |kind, sql: &str| MetadataQuery::new(kind, sql, product(3, 0));

    super::add(
        registry,
        [
            q(Kind::Version, "SELECT sqlite_version()").with_post(NamePrefix(NAME)),
            q(Kind::CurrentCatalog, "SELECT ''"),
            q(Kind::CurrentSchema, "SELECT 'main'").with_pre(StaticRows::single("name", "main")),
            q(Kind::Schemas, "SELECT '' AS catalog, name FROM pragma_database_list"),
            q(
                Kind::Tables,
                "SELECT '' AS catalog, 'main' AS schema, name, 'BASE TABLE' AS table_type \
                 FROM $Args[1].sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            ),
            q(
                Kind::Views,
                "SELECT '' AS catalog, 'main' AS schema, name, 'VIEW' AS table_type \
                 FROM $Args[1].sqlite_master WHERE type = 'view'",
            ),
            q(
                Kind::Table,
                "SELECT '$Args[2]' AS table_name, name AS column_name, cid + 1 AS position, \
                 type AS data_type, CASE WHEN \"notnull\" = 1 THEN 'NO' ELSE 'YES' END AS is_nullable, \
                 dflt_value AS column_default, pk AS key_position \
                 FROM pragma_table_info('$Args[2]') ORDER BY cid",
            ),
            q(
                Kind::PrimaryKeys,
                "SELECT '$Args[2]' AS table_name, 'PRIMARY' AS name, name AS column_name, pk AS position, \
                 'PRIMARY' AS key_type FROM pragma_table_info('$Args[2]') WHERE pk > 0 ORDER BY pk",
            ),
            q(
                Kind::ForeignKeys,
                "SELECT '$Args[2]' AS table_name, 'FK_' || id AS name, \"from\" AS column_name, \
                 seq + 1 AS position, 'FOREIGN' AS key_type, \"table\" AS ref_table, \"to\" AS ref_column \
                 FROM pragma_foreign_key_list('$Args[2]')",
            ),
            q(
                Kind::Indexes,
                "SELECT '$Args[2]' AS table_name, il.name AS name, ii.name AS column_name, \
                 ii.seqno + 1 AS position, il.\"unique\" AS is_unique \
                 FROM pragma_index_list('$Args[2]') il JOIN pragma_index_info(il.name) ii",
            ),
            q(
                Kind::Index,
                "SELECT '$Args[2]' AS table_name, il.name AS name, ii.name AS column_name, \
                 ii.seqno + 1 AS position, il.\"unique\" AS is_unique \
                 FROM pragma_index_list('$Args[2]') il JOIN pragma_index_info(il.name) ii",
            )
            .with_criteria(&["", "", "", "il.name"]),
            q(
                Kind::Sequences,
                "SELECT '' AS catalog, 'main' AS schema, name, seq AS value, 1 AS increment_by \
                 FROM sqlite_sequence",
            ),
            q(
                Kind::SequenceNextValue,
                "SELECT COALESCE(MAX(seq), 0) + 1 AS value FROM sqlite_sequence WHERE name = '$Args[2]'",
            ),
            q(
                Kind::Functions,
                "SELECT '' AS catalog, 'main' AS schema, name, type AS routine_type FROM pragma_function_list",
            ),
            q(Kind::FkCheckOn, "PRAGMA foreign_keys = ON"),
            q(Kind::FkCheckOff, "PRAGMA foreign_keys = OFF"),
        ],
    );
}
