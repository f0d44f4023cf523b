mod support;
use support::{setup, User, USERS};

use pretty_assertions::assert_eq;
use sqlkit::{
    cache::{FileCache, FileCacheConfig, IndexedQuery, KvCache, KvCacheConfig, MemoryRecorder, MemoryStore},
    Cache, Options, Value,
};
use std_util::assert_ok;

use std::sync::Arc;

#[derive(Debug, Default, PartialEq, sqlkit::Record)]
struct Event {
    id: i64,
    unk: String,
}

#[tokio::test]
async fn file_cache_serves_repeated_reads() {
    let (db, conn) = setup(USERS);
    assert_ok!(conn.execute_batch(
        "INSERT INTO users (name, email) VALUES ('ann', 'ann@x.io'), ('bob', NULL)"
    ));

    let dir = assert_ok!(tempfile::tempdir());
    let recorder = Arc::new(MemoryRecorder::new());
    let cache = assert_ok!(
        FileCache::new(FileCacheConfig {
            dir: dir.path().to_path_buf(),
            ..FileCacheConfig::default()
        })
        .await
    )
    .with_recorder(recorder.clone());
    let options = Options::new().cache(Arc::new(cache));

    let reader = db.reader("SELECT id, name, email FROM users ORDER BY id");
    let first: Vec<User> = assert_ok!(reader.query_records(&[], &options).await);
    assert_eq!(first.len(), 2);
    assert_eq!(recorder.rows().len(), 2);

    assert_ok!(conn.execute_batch("DELETE FROM users"));

    let second: Vec<User> = assert_ok!(reader.query_records(&[], &options).await);
    assert_eq!(second, first);
    assert_eq!(recorder.rows().len(), 2);

    let uncached: Vec<User> = assert_ok!(reader.query_records(&[], &Options::new()).await);
    assert!(uncached.is_empty());
}

#[tokio::test]
async fn early_stop_leaves_no_entry() {
    let (db, conn) = setup(USERS);
    assert_ok!(conn.execute_batch("INSERT INTO users (name) VALUES ('ann'), ('bob')"));

    let store = Arc::new(MemoryStore::new());
    let cache = KvCache::new(store.clone(), KvCacheConfig::default());
    let options = Options::new().cache(Arc::new(cache));

    let reader = db.reader("SELECT id, name, email FROM users ORDER BY id");
    let one: Option<User> = assert_ok!(reader.query_one(&[], &options).await);
    assert_eq!(one.map(|user| user.name), Some("ann".to_string()));
    assert!(store.is_empty());

    let all: Vec<User> = assert_ok!(reader.query_records(&[], &options).await);
    assert_eq!(all.len(), 2);
    assert!(!store.is_empty());
}

#[tokio::test]
async fn indexed_lookups_are_served_from_the_cache() {
    let (db, conn) = setup(
        "CREATE TABLE t11 (id INTEGER PRIMARY KEY, unk TEXT);
         INSERT INTO t11 VALUES (1, '101'), (2, '100'), (3, '101'), (4, '102'), (5, '101');",
    );

    let cache = Arc::new(KvCache::new(
        Arc::new(MemoryStore::new()),
        KvCacheConfig::default(),
    ));
    let sql = "SELECT id, unk FROM t11 ORDER BY id";
    let stored = assert_ok!(cache.index_by(db.connection().as_ref(), "unk", sql, &[]).await);
    assert_eq!(stored, 5);

    assert_ok!(conn.execute_batch("DELETE FROM t11"));

    let query = IndexedQuery::new(sql, "unk")
        .with_values(vec![Value::from("101"), Value::from("102")])
        .with_limit(2);
    let options = Options::new().cache(cache);
    let events: Vec<Event> = assert_ok!(db.reader(sql).query_indexed(&query, &options).await);

    let ids: Vec<_> = events.iter().map(|event| event.id).collect();
    assert_eq!(ids, [1, 3, 4]);
}

#[tokio::test]
async fn indexed_lookup_without_cache_filters_database_rows() {
    let (db, _conn) = setup(
        "CREATE TABLE t11 (id INTEGER PRIMARY KEY, unk TEXT);
         INSERT INTO t11 VALUES (1, '101'), (2, '100'), (3, '101');",
    );

    let query = IndexedQuery::new("SELECT id, unk FROM t11 ORDER BY id", "unk")
        .with_values(vec![Value::from("100")]);
    let events: Vec<Event> = assert_ok!(
        db.reader(query.sql.clone())
            .query_indexed(&query, &Options::new())
            .await
    );
    assert_eq!(
        events,
        [Event {
            id: 2,
            unk: "100".to_string()
        }]
    );
}

#[tokio::test]
async fn changing_row_types_bypass_the_cache() {
    let (db, _conn) = setup(
        "CREATE TABLE mixed (id INTEGER PRIMARY KEY, v);
         INSERT INTO mixed VALUES (1, 10), (2, 'two'), (3, 30);",
    );

    let store = Arc::new(MemoryStore::new());
    let options = Options::new().cache(Arc::new(KvCache::new(store.clone(), KvCacheConfig::default())));
    let reader = db.reader("SELECT id, v FROM mixed ORDER BY id");

    for _ in 0..2 {
        let mut rows = vec![];
        assert_ok!(
            reader
                .query_all_with_slice(&[], &options, |row| {
                    rows.push(row);
                    Ok(true)
                })
                .await
        );
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][1], Value::I64(10));
        assert_eq!(rows[1][1], Value::from("two"));
        assert!(store.is_empty());
    }
}
