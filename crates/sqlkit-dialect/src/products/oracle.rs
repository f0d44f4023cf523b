//! Oracle Database.

use crate::{
    Dialect, InsertStrategy, Kind, MetadataQuery, Placeholder, PresetIdStrategy, Product, Registry,
    UpsertStrategy,
};

pub const NAME: &str = "Oracle";
pub const DRIVER: &str = "oracle";

pub fn product(major: u32, minor: u32) -> Product {
    Product::new(NAME, DRIVER).with_version(major, minor)
}

pub fn register(registry: &Registry) {
    let dialect = |major, minor| {
        Dialect::new(product(major, minor))
            .with_placeholder(Placeholder::Numbered(":"))
            .with_insert(InsertStrategy::SingleValues)
            .with_upsert(UpsertStrategy::MergeInto)
            .with_preset_id(PresetIdStrategy::Sequence)
    };

    registry.register_dialect(dialect(11, 0));
    // Identity columns arrived with 12c.
    registry.register_dialect(dialect(12, 0).with_autoincrement(true));

    let q = |kind, sql: &str| MetadataQuery::new(kind, sql, product(11, 0));

    super::add(
        registry,
        [
            q(Kind::Version, "SELECT banner FROM v$version WHERE banner LIKE 'Oracle%'"),
            q(Kind::CurrentCatalog, "SELECT SYS_CONTEXT('USERENV', 'DB_NAME') FROM dual"),
            q(Kind::CurrentSchema, "SELECT SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA') FROM dual"),
            q(Kind::Schemas, "SELECT '' AS catalog, username AS name FROM all_users"),
            q(
                Kind::Tables,
                "SELECT '' AS catalog, owner AS schema, table_name AS name, 'BASE TABLE' AS table_type FROM all_tables",
            )
            .with_criteria(&["", "owner"]),
            q(
                Kind::Views,
                "SELECT '' AS catalog, owner AS schema, view_name AS name, 'VIEW' AS table_type FROM all_views",
            )
            .with_criteria(&["", "owner"]),
            q(
                Kind::Table,
                "SELECT owner AS schema, table_name, column_name, column_id AS position, data_type, \
                 data_length AS data_type_length, data_precision AS numeric_precision, \
                 data_scale AS numeric_scale, CASE WHEN nullable = 'Y' THEN 'YES' ELSE 'NO' END AS is_nullable \
                 FROM all_tab_columns $WHERE ORDER BY column_id",
            )
            .with_criteria(&["", "owner", "table_name"]),
            q(
                Kind::PrimaryKeys,
                "SELECT c.owner AS schema, c.table_name, c.constraint_name AS name, k.column_name, \
                 k.position, 'PRIMARY' AS key_type \
                 FROM all_constraints c JOIN all_cons_columns k \
                 ON k.owner = c.owner AND k.constraint_name = c.constraint_name \
                 WHERE c.constraint_type = 'P' $WHERE ORDER BY k.position",
            )
            .with_criteria(&["", "c.owner", "c.table_name"]),
            q(
                Kind::ForeignKeys,
                "SELECT c.owner AS schema, c.table_name, c.constraint_name AS name, k.column_name, \
                 k.position, 'FOREIGN' AS key_type, r.table_name AS ref_table, r.column_name AS ref_column \
                 FROM all_constraints c \
                 JOIN all_cons_columns k ON k.owner = c.owner AND k.constraint_name = c.constraint_name \
                 JOIN all_cons_columns r ON r.owner = c.r_owner AND r.constraint_name = c.r_constraint_name \
                 AND r.position = k.position \
                 WHERE c.constraint_type = 'R' $WHERE",
            )
            .with_criteria(&["", "c.owner", "c.table_name"]),
            q(
                Kind::Indexes,
                "SELECT i.table_owner AS schema, i.table_name, i.index_name AS name, c.column_name, \
                 c.column_position AS position, CASE WHEN i.uniqueness = 'UNIQUE' THEN 1 ELSE 0 END AS is_unique, \
                 i.index_type FROM all_indexes i JOIN all_ind_columns c \
                 ON c.index_owner = i.owner AND c.index_name = i.index_name $WHERE",
            )
            .with_criteria(&["", "i.table_owner", "i.table_name"]),
            q(
                Kind::Index,
                "SELECT i.table_owner AS schema, i.table_name, i.index_name AS name, c.column_name, \
                 c.column_position AS position, CASE WHEN i.uniqueness = 'UNIQUE' THEN 1 ELSE 0 END AS is_unique, \
                 i.index_type FROM all_indexes i JOIN all_ind_columns c \
                 ON c.index_owner = i.owner AND c.index_name = i.index_name $WHERE",
            )
            .with_criteria(&["", "i.table_owner", "i.table_name", "i.index_name"]),
            q(
                Kind::Sequences,
                "SELECT '' AS catalog, sequence_owner AS schema, sequence_name AS name, \
                 last_number AS value, increment_by FROM all_sequences",
            )
            .with_criteria(&["", "sequence_owner"]),
            q(Kind::SequenceNextValue, "SELECT $Args[1].$Args[2].NEXTVAL AS value FROM dual"),
            q(
                Kind::Functions,
                "SELECT '' AS catalog, owner AS schema, object_name AS name, object_type AS routine_type \
                 FROM all_procedures",
            )
            .with_criteria(&["", "owner"]),
            q(
                Kind::Session,
                "SELECT SYS_CONTEXT('USERENV', 'SID') AS pid, USER AS username, \
                 SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA') AS schema FROM dual",
            ),
        ],
    );
}
