mod support;
use support::{setup, User, USERS};

use pretty_assertions::assert_eq;
use sqlkit::{Options, Unmapped, Value};
use std::sync::Arc;
use std_util::{assert_err, assert_none, assert_ok, assert_some};

const SEED: &str = "
    INSERT INTO users (id, name, email) VALUES
        (1, 'ann', 'ann@x.io'),
        (2, 'bob', NULL),
        (3, 'cid', 'cid@x.io');
";

#[tokio::test]
async fn query_records_and_one() {
    let (db, conn) = setup(USERS);
    assert_ok!(conn.execute_batch(SEED));

    let reader = db.reader("SELECT id, name, email FROM users WHERE id >= ? ORDER BY id");
    let users: Vec<User> = assert_ok!(reader.query_records(&[Value::I64(2)], &Options::new()).await);
    assert_eq!(
        users,
        [
            User { id: 2, ..User::new("bob", None) },
            User { id: 3, ..User::new("cid", Some("cid@x.io")) },
        ]
    );

    let first: Option<User> = assert_ok!(reader.query_one(&[Value::I64(3)], &Options::new()).await);
    assert_eq!(assert_some!(first).name, "cid");

    let none: Option<User> = assert_ok!(reader.query_one(&[Value::I64(9)], &Options::new()).await);
    assert_none!(none);
}

#[tokio::test]
async fn emit_can_stop_early() {
    let (db, conn) = setup(USERS);
    assert_ok!(conn.execute_batch(SEED));

    let mut seen = vec![];
    assert_ok!(
        db.reader("SELECT id, name FROM users ORDER BY id")
            .query_all(&[], &Options::new(), |user: User| {
                seen.push(user.id);
                Ok(seen.len() < 2)
            })
            .await
    );
    assert_eq!(seen, [1, 2]);
}

#[tokio::test]
async fn slices_and_maps() {
    let (db, conn) = setup(USERS);
    assert_ok!(conn.execute_batch(SEED));
    let reader = db.reader("SELECT id, name, email FROM users WHERE id = 2");

    let mut slices = vec![];
    assert_ok!(
        reader
            .query_all_with_slice(&[], &Options::new(), |row| {
                slices.push(row);
                Ok(true)
            })
            .await
    );
    assert_eq!(slices, [vec![Value::I64(2), Value::from("bob"), Value::Null]]);

    let mut maps = vec![];
    assert_ok!(
        reader
            .query_all_with_map(&[], &Options::new(), |row| {
                maps.push(row);
                Ok(true)
            })
            .await
    );
    let keys: Vec<_> = maps[0].keys().cloned().collect();
    assert_eq!(keys, ["id", "name", "email"]);
    assert_eq!(maps[0]["name"], Value::from("bob"));
}

#[tokio::test]
async fn unmatched_columns() {
    let (db, conn) = setup(USERS);
    assert_ok!(conn.execute_batch(SEED));
    let reader = db.reader("SELECT id, name, 'x' AS extra FROM users WHERE id = 1");

    let err = assert_err!(reader.query_records::<User>(&[], &Options::new()).await);
    assert!(err.is_unmatched_columns(), "{err}");

    let unmapped = Arc::new(Unmapped::new());
    let users: Vec<User> = assert_ok!(
        reader
            .query_records(&[], &Options::new().resolver(unmapped.clone()))
            .await
    );
    assert_eq!(users[0].name, "ann");
    let extra = assert_some!(unmapped.row(0));
    assert_eq!(extra["extra"], Value::from("x"));
}

#[derive(Debug, Default, sqlkit::Record)]
struct Nested {
    #[sqlkit("ID")]
    id: i64,
    #[sqlkit("ns=z_")]
    z: Inner,
}

#[derive(Debug, Default, sqlkit::Record)]
struct Inner {
    #[sqlkit("ID")]
    id: i64,
}

#[tokio::test]
async fn namespaced_fields() {
    let (db, _conn) = setup(USERS);
    let rows: Vec<Nested> = assert_ok!(
        db.reader("SELECT 1 AS ID, 2 AS Z_ID")
            .query_records(&[], &Options::new())
            .await
    );
    assert_eq!(rows[0].id, 1);
    assert_eq!(rows[0].z.id, 2);
}
