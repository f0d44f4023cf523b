mod support;
use support::setup;

use pretty_assertions::assert_eq;
use sqlkit::{
    cache::{KvCache, KvCacheConfig, MemoryStore},
    MergeConfig, MergeStrategy, Options,
};
use std_util::assert_ok;

use std::sync::Arc;

const ITEMS: &str = "
    CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL, region TEXT NOT NULL DEFAULT 'emea');
    INSERT INTO items (id, name) VALUES (1, 'a'), (2, 'b'), (3, 'c');
";

#[derive(Debug, Default, Clone, PartialEq, sqlkit::Record)]
struct Item {
    #[sqlkit("id,primaryKey")]
    id: i64,
    name: String,
}

fn item(id: i64, name: &str) -> Item {
    Item {
        id,
        name: name.to_string(),
    }
}

async fn contents(db: &sqlkit::Db) -> Vec<Item> {
    assert_ok!(
        db.reader("SELECT id, name FROM items ORDER BY id")
            .query_records(&[], &Options::new())
            .await
    )
}

#[tokio::test]
async fn decomposed_merge_applies_differences() {
    let (db, _conn) = setup(ITEMS);
    let config = MergeConfig::new()
        .strategy(MergeStrategy::INSERT | MergeStrategy::UPDATE | MergeStrategy::DELETE);

    let mut staged = vec![item(1, "a"), item(2, "B"), item(4, "d")];
    let report = assert_ok!(db.merger::<Item>("items", config).merge(&mut staged, &Options::new()).await);

    assert_eq!(
        (report.inserted, report.updated, report.deleted, report.unchanged),
        (1, 1, 1, 1)
    );
    let phases: Vec<_> = report.phases.iter().map(|p| p.name).collect();
    assert_eq!(phases, ["fetch", "insert", "update", "delete"]);
    assert_eq!(contents(&db).await, [item(1, "a"), item(2, "B"), item(4, "d")]);
}

#[tokio::test]
async fn native_upsert() {
    let (db, _conn) = setup(ITEMS);

    let mut staged = vec![item(1, "A"), item(5, "e")];
    let report = assert_ok!(
        db.merger::<Item>("items", MergeConfig::new())
            .merge(&mut staged, &Options::new())
            .await
    );

    assert_eq!(report.upserted, 2);
    assert_eq!(
        contents(&db).await,
        [item(1, "A"), item(2, "b"), item(3, "c"), item(5, "e")]
    );
}

#[tokio::test]
async fn scope_limits_deletes() {
    let (db, conn) = setup(ITEMS);
    assert_ok!(conn.execute_batch("UPDATE items SET region = 'apac' WHERE id = 3"));

    let config = MergeConfig::new()
        .strategy(MergeStrategy::DELETE)
        .scope("region = 'emea'");
    let mut staged = vec![item(1, "a")];
    let report = assert_ok!(db.merger::<Item>("items", config).merge(&mut staged, &Options::new()).await);

    assert_eq!(report.deleted, 1);
    assert_eq!(contents(&db).await, [item(1, "a"), item(3, "c")]);
}

#[tokio::test]
async fn merge_classifies_against_live_rows_when_caching() {
    let (db, _conn) = setup(ITEMS);
    let options = Options::new().cache(Arc::new(KvCache::new(
        Arc::new(MemoryStore::new()),
        KvCacheConfig::default(),
    )));
    let strategy = MergeStrategy::INSERT | MergeStrategy::UPDATE | MergeStrategy::DELETE;

    let mut staged = vec![item(1, "a"), item(2, "B"), item(4, "d")];
    let report = assert_ok!(
        db.merger::<Item>("items", MergeConfig::new().strategy(strategy))
            .merge(&mut staged, &options)
            .await
    );
    assert_eq!((report.inserted, report.updated, report.deleted), (1, 1, 1));

    let mut staged = vec![item(1, "a"), item(2, "B"), item(4, "d")];
    let report = assert_ok!(
        db.merger::<Item>("items", MergeConfig::new().strategy(strategy))
            .merge(&mut staged, &options)
            .await
    );
    assert_eq!(
        (report.inserted, report.updated, report.deleted, report.unchanged),
        (0, 0, 0, 3)
    );
    assert_eq!(contents(&db).await, [item(1, "a"), item(2, "B"), item(4, "d")]);
}
