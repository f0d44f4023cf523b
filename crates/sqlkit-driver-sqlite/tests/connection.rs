use sqlkit_core::{
    driver::{Connection as _, Transaction as _},
    Value,
};
use sqlkit_driver_sqlite::{Connection, Sqlite};
use std_util::{assert_err, assert_ok};

async fn names(conn: &Connection) -> Vec<Value> {
    let mut stmt = assert_ok!(conn.prepare("SELECT name FROM t ORDER BY id").await);
    let mut rows = assert_ok!(stmt.query(&[]).await);
    let mut names = vec![];
    let mut row = vec![];
    while assert_ok!(rows.next(&mut row).await) {
        names.push(row.remove(0));
    }
    names
}

fn connect() -> Connection {
    let conn = assert_ok!(Connection::in_memory());
    assert_ok!(conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL)"));
    conn
}

#[tokio::test]
async fn exec_reports_rows_and_last_id() {
    let conn = connect();
    let mut stmt = assert_ok!(conn.prepare("INSERT INTO t (name, score) VALUES (?, ?)").await);

    let first = assert_ok!(stmt.exec(&[Value::from("a"), Value::F64(1.5)]).await);
    let second = assert_ok!(stmt.exec(&[Value::from("b"), Value::Null]).await);
    assert_eq!((first.rows_affected, first.last_insert_id), (1, Some(1)));
    assert_eq!((second.rows_affected, second.last_insert_id), (1, Some(2)));

    assert_eq!(names(&conn).await, [Value::from("a"), Value::from("b")]);
}

#[tokio::test]
async fn query_reports_declared_types() {
    let conn = connect();
    assert_ok!(conn.execute_batch("INSERT INTO t (name, score) VALUES ('a', 2.5)"));

    let mut stmt = assert_ok!(conn.prepare("SELECT id, name, score FROM t").await);
    let mut rows = assert_ok!(stmt.query(&[]).await);
    assert_eq!(rows.columns(), ["id", "name", "score"]);

    let types: Vec<_> = rows
        .column_types()
        .unwrap_or_default()
        .into_iter()
        .map(|ty| ty.database_type)
        .collect();
    assert_eq!(types, ["INTEGER", "TEXT", "REAL"]);

    let mut row = vec![];
    assert!(assert_ok!(rows.next(&mut row).await));
    assert_eq!(row, [Value::I64(1), Value::from("a"), Value::F64(2.5)]);
    assert!(!assert_ok!(rows.next(&mut row).await));
}

#[tokio::test]
async fn syntax_errors_surface_on_prepare() {
    let conn = connect();
    match conn.prepare("SELEC 1").await {
        Ok(_) => panic!("expected a syntax error"),
        Err(err) => assert!(err.is_driver(), "{err}"),
    }
}

#[tokio::test]
async fn constraint_errors_are_classified() {
    let conn = connect();
    let mut stmt = assert_ok!(conn.prepare("INSERT INTO t (id, name) VALUES (?, ?)").await);
    assert_ok!(stmt.exec(&[Value::I64(1), Value::from("a")]).await);

    let err = assert_err!(stmt.exec(&[Value::I64(1), Value::from("b")]).await);
    assert!(err.is_constraint_violation(), "{err}");
}

#[tokio::test]
async fn rollback_discards_changes() {
    let conn = connect();
    let tx = assert_ok!(conn.begin().await);
    let mut stmt = assert_ok!(tx.prepare("INSERT INTO t (name) VALUES ('a')").await);
    assert_ok!(stmt.exec(&[]).await);
    assert_ok!(tx.rollback().await);

    assert!(names(&conn).await.is_empty());
    assert_err!(tx.commit().await);
    assert!(tx.prepare("SELECT 1").await.is_err());
}

#[tokio::test]
async fn nested_transactions_use_savepoints() {
    let conn = connect();
    let outer = assert_ok!(conn.begin().await);
    assert_ok!(assert_ok!(outer.prepare("INSERT INTO t (name) VALUES ('kept')").await)
        .exec(&[])
        .await);

    let inner = assert_ok!(conn.begin().await);
    assert_ok!(assert_ok!(inner.prepare("INSERT INTO t (name) VALUES ('dropped')").await)
        .exec(&[])
        .await);

    // The outer transaction cannot finish while the savepoint is open.
    assert_err!(outer.commit().await);
    assert_ok!(inner.rollback().await);
    assert_ok!(outer.commit().await);
    assert_eq!(names(&conn).await, [Value::from("kept")]);
}

#[test]
fn parses_connection_urls() {
    assert!(matches!(assert_ok!(Sqlite::new("sqlite::memory:")), Sqlite::InMemory));

    match assert_ok!(Sqlite::new("sqlite:///tmp/app.db")) {
        Sqlite::File(path) => assert_eq!(path.to_str(), Some("/tmp/app.db")),
        other => panic!("unexpected {other:?}"),
    }

    let err = assert_err!(Sqlite::new("postgres://localhost/app"));
    assert!(err.is_configuration(), "{err}");
}

#[tokio::test]
async fn file_databases_persist() {
    let dir = assert_ok!(tempfile::tempdir());
    let path = dir.path().join("app.db");

    let conn = assert_ok!(Sqlite::open(&path).connect());
    assert_ok!(conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL); INSERT INTO t (name) VALUES ('a')"));
    drop(conn);

    let conn = assert_ok!(Sqlite::open(&path).connect());
    assert_eq!(names(&conn).await, [Value::from("a")]);
}
