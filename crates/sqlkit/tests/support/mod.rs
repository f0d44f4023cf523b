#![allow(dead_code)]

use sqlkit::Db;
use sqlkit_driver_sqlite::Connection;

pub const USERS: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT UNIQUE
    );
";

#[derive(Debug, Default, Clone, PartialEq, sqlkit::Record)]
pub struct User {
    #[sqlkit("id,autoincrement")]
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
}

impl User {
    pub fn new(name: &str, email: Option<&str>) -> User {
        User {
            id: 0,
            name: name.to_string(),
            email: email.map(str::to_string),
        }
    }
}

/// A database over a fresh in-memory connection with `schema` applied.
pub fn setup(schema: &str) -> (Db, Connection) {
    let conn = std_util::assert_ok!(Connection::in_memory());
    std_util::assert_ok!(conn.execute_batch(schema));
    (Db::new(conn.clone()), conn)
}
