use sqlkit_dialect::{
    products, Kind, LastInsertIdMode, Placeholder, Product, Registry, UpsertStrategy,
};

use pretty_assertions::assert_eq;

#[test]
fn builtin_queries_satisfy_their_criteria() {
    let registry = Registry::global();

    for product in registry.products() {
        for kind in Kind::ALL {
            if let Ok(query) = registry.lookup(&product, kind) {
                assert!(
                    query.criteria.validate(kind).is_ok(),
                    "{product} {kind} has invalid criteria"
                );
                assert_eq!(query.kind, kind);
            }
        }
    }
}

#[test]
fn every_product_has_a_dialect() {
    let registry = Registry::global();
    for product in registry.products() {
        assert!(registry.dialect(&product).is_ok(), "no dialect for {product}");
    }
}

#[test]
fn sqlite_capabilities_follow_version() {
    let registry = Registry::with_builtins();

    let old = registry.dialect(&products::sqlite::product(3, 7)).unwrap();
    assert!(!old.can_returning);
    assert_eq!(old.upsert, UpsertStrategy::Undefined);

    let new = registry.dialect(&products::sqlite::product(3, 45)).unwrap();
    assert!(new.can_returning);
    assert_eq!(new.upsert, UpsertStrategy::OnConflict);
    assert_eq!(new.last_insert_id_mode, LastInsertIdMode::Last);
}

#[test]
fn detect_by_driver_name() {
    let registry = Registry::with_builtins();
    assert_eq!(registry.product_for_driver("sqlite3").name, products::sqlite::NAME);
    assert_eq!(registry.product_for_driver("tokio-postgres").name, products::postgres::NAME);
    assert_eq!(registry.product_for_driver("mystery").name, products::ansi::NAME);
}

#[test]
fn postgres_placeholders_are_numbered() {
    let registry = Registry::with_builtins();
    let dialect = registry.dialect(&products::postgres::product(13, 0)).unwrap();
    assert_eq!(dialect.placeholder, Placeholder::Numbered("$"));

    let query = registry
        .lookup(&products::postgres::product(13, 0), Kind::Table)
        .unwrap();
    let rendered = query.render(
        &dialect,
        &["".to_string(), "public".to_string(), "users".to_string()],
    );
    assert!(rendered
        .sql
        .contains("WHERE table_schema = $1 AND table_name = $2 ORDER BY"));
}

#[test]
fn sqlite_index_query_filters_by_name() {
    let registry = Registry::with_builtins();
    let product = products::sqlite::product(3, 40);
    let dialect = registry.dialect(&product).unwrap();
    let query = registry.lookup(&product, Kind::Index).unwrap();

    let rendered = query.render(
        &dialect,
        &[
            String::new(),
            String::new(),
            "users".to_string(),
            "idx_email".to_string(),
        ],
    );
    assert!(rendered.sql.contains("pragma_index_list('users')"));
    assert!(rendered.sql.ends_with("WHERE il.name = ?"));
}

#[test]
fn newer_versions_use_closest_registered() {
    let registry = Registry::with_builtins();
    let product = Product::new("MySQL", "mysql").with_version(99, 0);
    let query = registry.lookup(&product, Kind::Table).unwrap();
    assert_eq!(query.product.major, 8);
}
