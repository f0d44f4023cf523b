mod support;
use support::{setup, USERS};

use pretty_assertions::assert_eq;
use sqlkit::{dialect::UpsertStrategy, Kind, Options};
use std_util::assert_ok;

#[tokio::test]
async fn detects_sqlite() {
    let (db, _conn) = setup(USERS);
    let options = Options::new();

    let product = assert_ok!(db.product(&options).await);
    assert_eq!(product.name, "SQLite");
    assert_eq!(product.major, 3);

    let dialect = assert_ok!(db.dialect(&options).await);
    assert_eq!(dialect.upsert, UpsertStrategy::OnConflict);
    assert!(dialect.can_autoincrement);

    let version = assert_ok!(db.metadata().version(db.connection().as_ref(), &options).await);
    assert!(version.starts_with("SQLite 3."), "{version}");
}

#[tokio::test]
async fn tables_and_columns() {
    let (db, conn) = setup(USERS);
    assert_ok!(conn.execute_batch("CREATE TABLE teams (id INTEGER PRIMARY KEY, name TEXT)"));
    let metadata = db.metadata();
    let conn = db.connection().as_ref();
    let options = Options::new();

    let tables = assert_ok!(metadata.tables(conn, "", "main", &options).await);
    let mut names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
    names.sort();
    assert_eq!(names, ["teams", "users"]);

    let columns = assert_ok!(metadata.columns(conn, "", "main", "users", &options).await);
    let described: Vec<_> = columns
        .iter()
        .map(|c| (c.column_name.as_str(), c.position, c.nullable(), c.is_primary_key()))
        .collect();
    assert_eq!(
        described,
        [
            ("id", Some(1), true, true),
            ("name", Some(2), false, false),
            ("email", Some(3), true, false),
        ]
    );

    let keys = assert_ok!(metadata.primary_keys(conn, "", "main", "users", &options).await);
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].column_name, "id");

    let schema = assert_ok!(metadata.current_schema(conn, &options).await);
    assert_eq!(schema, "main");
}

#[tokio::test]
async fn unregistered_kind_is_a_configuration_error() {
    let (db, _conn) = setup(USERS);
    let err = match db
        .metadata()
        .rows(db.connection().as_ref(), Kind::Session, &[], &Options::new())
        .await
    {
        Ok(rows) => panic!("expected error, got {rows:?}"),
        Err(err) => err,
    };
    assert!(err.is_configuration(), "{err}");
}
