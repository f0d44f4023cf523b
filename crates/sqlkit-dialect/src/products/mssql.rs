//! Microsoft SQL Server.

use crate::{Dialect, Kind, MetadataQuery, Placeholder, Product, Registry, UpsertStrategy};

pub const NAME: &str = "SQLServer";
pub const DRIVER: &str = "sqlserver";

pub fn product(major: u32, minor: u32) -> Product {
    Product::new(NAME, DRIVER).with_version(major, minor)
}

pub fn register(registry: &Registry) {
    registry.register_dialect(
        Dialect::new(product(2008, 0))
            .with_placeholder(Placeholder::Numbered("@p"))
            .with_upsert(UpsertStrategy::MergeInto)
            .with_autoincrement(true),
    );

    let q = |kind, sql: &str| MetadataQuery::new(kind, sql, product(2008, 0));

    super::add(
        registry,
        [
            q(Kind::Version, "SELECT @@VERSION"),
            q(Kind::CurrentCatalog, "SELECT DB_NAME()"),
            q(Kind::CurrentSchema, "SELECT SCHEMA_NAME()"),
            q(Kind::Catalogs, "SELECT name FROM sys.databases"),
            q(
                Kind::Schemas,
                "SELECT catalog_name AS catalog, schema_name AS name FROM information_schema.schemata",
            )
            .with_criteria(&["catalog_name"]),
            q(
                Kind::Tables,
                "SELECT table_catalog AS catalog, table_schema AS [schema], table_name AS name, table_type \
                 FROM information_schema.tables WHERE table_type = 'BASE TABLE'",
            )
            .with_criteria(&["table_catalog", "table_schema"]),
            q(
                Kind::Views,
                "SELECT table_catalog AS catalog, table_schema AS [schema], table_name AS name, 'VIEW' AS table_type \
                 FROM information_schema.views",
            )
            .with_criteria(&["table_catalog", "table_schema"]),
            q(
                Kind::Table,
                "SELECT table_catalog AS catalog, table_schema AS [schema], table_name, column_name, \
                 ordinal_position AS position, data_type, character_maximum_length AS data_type_length, \
                 numeric_precision, numeric_scale, is_nullable, column_default, \
                 COLUMNPROPERTY(OBJECT_ID(table_schema + '.' + table_name), column_name, 'IsIdentity') AS is_autoincrement \
                 FROM information_schema.columns $WHERE ORDER BY ordinal_position",
            )
            .with_criteria(&["table_catalog", "table_schema", "table_name"]),
            q(
                Kind::PrimaryKeys,
                "SELECT k.table_catalog AS catalog, k.table_schema AS [schema], k.table_name, \
                 k.constraint_name AS name, k.column_name, k.ordinal_position AS position, 'PRIMARY' AS key_type \
                 FROM information_schema.table_constraints c \
                 JOIN information_schema.key_column_usage k ON k.constraint_name = c.constraint_name \
                 WHERE c.constraint_type = 'PRIMARY KEY' $WHERE ORDER BY k.ordinal_position",
            )
            .with_criteria(&["k.table_catalog", "k.table_schema", "k.table_name"]),
            q(
                Kind::Sequences,
                "SELECT DB_NAME() AS catalog, SCHEMA_NAME(schema_id) AS [schema], name, \
                 CAST(current_value AS BIGINT) AS value, CAST(increment AS BIGINT) AS increment_by FROM sys.sequences",
            ),
            q(
                Kind::SequenceNextValue,
                "SELECT NEXT VALUE FOR $Args[1].$Args[2] AS value",
            ),
            q(
                Kind::Session,
                "SELECT CAST(@@SPID AS VARCHAR(16)) AS pid, SUSER_NAME() AS username, DB_NAME() AS catalog, \
                 SCHEMA_NAME() AS [schema]",
            ),
        ],
    );
}
