//! MySQL and compatible servers.

use crate::{
    Dialect, Kind, LastInsertIdMode, LoadStrategy, MetadataQuery, Placeholder, PresetIdStrategy,
    Product, Registry, UpsertStrategy,
};

pub const NAME: &str = "MySQL";
pub const DRIVER: &str = "mysql";

pub fn product(major: u32, minor: u32) -> Product {
    Product::new(NAME, DRIVER).with_version(major, minor)
}

pub fn register(registry: &Registry) {
    let dialect = |major, minor| {
        Dialect::new(product(major, minor))
            .with_placeholder(Placeholder::Fixed("?"))
            .with_quote('`')
            .with_upsert(UpsertStrategy::OnDuplicateKey)
            .with_load(LoadStrategy::LoadDataLocal)
            .with_autoincrement(true)
            .with_last_insert_id(true, LastInsertIdMode::First)
    };

    registry.register_dialect(dialect(5, 0).with_preset_id(PresetIdStrategy::Max));
    registry.register_dialect(dialect(8, 0));

    let q = |kind, sql: &str| MetadataQuery::new(kind, sql, product(5, 0));

    super::add(
        registry,
        [
            q(Kind::Version, "SELECT VERSION()"),
            q(Kind::CurrentCatalog, "SELECT 'def'"),
            q(Kind::CurrentSchema, "SELECT DATABASE()"),
            q(Kind::Catalogs, "SELECT DISTINCT catalog_name AS name FROM information_schema.schemata"),
            q(
                Kind::Schemas,
                "SELECT catalog_name AS catalog, schema_name AS name FROM information_schema.schemata",
            )
            .with_criteria(&["catalog_name"]),
            q(
                Kind::Tables,
                "SELECT table_catalog AS catalog, table_schema AS `schema`, table_name AS name, table_type \
                 FROM information_schema.tables WHERE table_type = 'BASE TABLE'",
            )
            .with_criteria(&["table_catalog", "table_schema"]),
            q(
                Kind::Views,
                "SELECT table_catalog AS catalog, table_schema AS `schema`, table_name AS name, 'VIEW' AS table_type \
                 FROM information_schema.views",
            )
            .with_criteria(&["table_catalog", "table_schema"]),
            q(
                Kind::Table,
                "SELECT table_catalog AS catalog, table_schema AS `schema`, table_name, column_name, \
                 ordinal_position AS position, column_type AS data_type, \
                 character_maximum_length AS data_type_length, numeric_precision, numeric_scale, \
                 is_nullable, column_default, column_key AS key_type, \
                 CASE WHEN extra LIKE '%auto_increment%' THEN 1 ELSE 0 END AS is_autoincrement \
                 FROM information_schema.columns $WHERE ORDER BY ordinal_position",
            )
            .with_criteria(&["table_catalog", "table_schema", "table_name"]),
            q(
                Kind::PrimaryKeys,
                "SELECT table_catalog AS catalog, table_schema AS `schema`, table_name, constraint_name AS name, \
                 column_name, ordinal_position AS position, 'PRIMARY' AS key_type \
                 FROM information_schema.key_column_usage WHERE constraint_name = 'PRIMARY' \
                 $WHERE ORDER BY ordinal_position",
            )
            .with_criteria(&["table_catalog", "table_schema", "table_name"]),
            q(
                Kind::ForeignKeys,
                "SELECT table_catalog AS catalog, table_schema AS `schema`, table_name, constraint_name AS name, \
                 column_name, ordinal_position AS position, 'FOREIGN' AS key_type, \
                 referenced_table_name AS ref_table, referenced_column_name AS ref_column \
                 FROM information_schema.key_column_usage WHERE referenced_table_name IS NOT NULL",
            )
            .with_criteria(&["table_catalog", "table_schema", "table_name"]),
            q(
                Kind::Indexes,
                "SELECT table_catalog AS catalog, table_schema AS `schema`, table_name, index_name AS name, \
                 column_name, seq_in_index AS position, 1 - non_unique AS is_unique, index_type \
                 FROM information_schema.statistics $WHERE ORDER BY index_name, seq_in_index",
            )
            .with_criteria(&["table_catalog", "table_schema", "table_name"]),
            q(
                Kind::Index,
                "SELECT table_catalog AS catalog, table_schema AS `schema`, table_name, index_name AS name, \
                 column_name, seq_in_index AS position, 1 - non_unique AS is_unique, index_type \
                 FROM information_schema.statistics $WHERE ORDER BY seq_in_index",
            )
            .with_criteria(&["table_catalog", "table_schema", "table_name", "index_name"]),
            q(
                Kind::Sequences,
                "SELECT table_catalog AS catalog, table_schema AS `schema`, table_name AS name, \
                 auto_increment AS value, 1 AS increment_by \
                 FROM information_schema.tables WHERE auto_increment IS NOT NULL",
            )
            .with_criteria(&["table_catalog", "table_schema"]),
            q(
                Kind::SequenceNextValue,
                "SELECT auto_increment AS value FROM information_schema.tables",
            )
            .with_criteria(&["table_catalog", "table_schema", "table_name"]),
            q(
                Kind::Functions,
                "SELECT routine_catalog AS catalog, routine_schema AS `schema`, routine_name AS name, \
                 routine_type, data_type FROM information_schema.routines",
            )
            .with_criteria(&["routine_catalog", "routine_schema"]),
            q(
                Kind::Session,
                "SELECT CONNECTION_ID() AS pid, CURRENT_USER() AS username, DATABASE() AS `schema`",
            ),
            q(Kind::FkCheckOn, "SET FOREIGN_KEY_CHECKS = 1"),
            q(Kind::FkCheckOff, "SET FOREIGN_KEY_CHECKS = 0"),
        ],
    );

    // MySQL 8 exposes upper-case information_schema columns and adds
    // invisible columns.
    super::add(
        registry,
        [MetadataQuery::new(
            Kind::Table,
            "SELECT TABLE_CATALOG AS catalog, TABLE_SCHEMA AS `schema`, TABLE_NAME AS table_name, \
             COLUMN_NAME AS column_name, ORDINAL_POSITION AS position, COLUMN_TYPE AS data_type, \
             CHARACTER_MAXIMUM_LENGTH AS data_type_length, NUMERIC_PRECISION AS numeric_precision, \
             NUMERIC_SCALE AS numeric_scale, IS_NULLABLE AS is_nullable, COLUMN_DEFAULT AS column_default, \
             COLUMN_KEY AS key_type, CASE WHEN EXTRA LIKE '%auto_increment%' THEN 1 ELSE 0 END AS is_autoincrement \
             FROM information_schema.COLUMNS WHERE EXTRA NOT LIKE '%INVISIBLE%' $WHERE ORDER BY ORDINAL_POSITION",
            product(8, 0),
        )
        .with_criteria(&["TABLE_CATALOG", "TABLE_SCHEMA", "TABLE_NAME"])],
    );
}
