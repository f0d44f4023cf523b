use crate::{products, Dialect, Kind, MetadataQuery, Product};

use sqlkit_core::{Error, Result};

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock, RwLock},
};

/// Catalog of products, dialects, and metadata queries.
///
/// Entries are kept per product, ordered by version. Lookups pick the highest
/// entry whose `(major, minor)` is at or below the requested version and fall
/// back to the latest registered entry.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    queries: HashMap<String, HashMap<Kind, Vec<Arc<MetadataQuery>>>>,
    dialects: HashMap<String, Vec<Arc<Dialect>>>,
    products: HashMap<String, Product>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Registry {
        Registry::default()
    }

    /// A registry holding every built-in product.
    pub fn with_builtins() -> Registry {
        let registry = Registry::new();
        products::register_all(&registry);
        registry
    }

    /// The process-wide registry, populated with the built-in products on
    /// first access.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::with_builtins)
    }

    /// Registers a metadata query. Registering a [`Kind::Version`] query also
    /// registers its product.
    pub fn register_query(&self, query: MetadataQuery) -> Result<()> {
        query.criteria.validate(query.kind)?;

        let mut inner = self.write();
        let key = query.product.key();

        if query.kind == Kind::Version {
            inner.products.insert(key.clone(), query.product.clone());
        }

        let versions = inner
            .queries
            .entry(key)
            .or_default()
            .entry(query.kind)
            .or_default();
        insert_by_version(versions, Arc::new(query), |query| &query.product);
        Ok(())
    }

    /// Registers a product without a version query.
    pub fn register_product(&self, product: Product) {
        self.write().products.insert(product.key(), product);
    }

    pub fn register_dialect(&self, dialect: Dialect) {
        let mut inner = self.write();
        let key = dialect.product.key();

        inner
            .products
            .entry(key.clone())
            .or_insert_with(|| dialect.product.clone());

        let versions = inner.dialects.entry(key).or_default();
        insert_by_version(versions, Arc::new(dialect), |dialect| &dialect.product);
    }

    /// Returns the query of `kind` matching `product`'s version.
    pub fn lookup(&self, product: &Product, kind: Kind) -> Result<Arc<MetadataQuery>> {
        let inner = self.read();
        inner
            .queries
            .get(&product.key())
            .and_then(|kinds| kinds.get(&kind))
            .and_then(|versions| select(versions, product, |query| &query.product))
            .ok_or_else(|| Error::configuration(format!("unsupported kind: {kind} for {product}")))
    }

    /// Returns the dialect matching `product`'s version.
    pub fn dialect(&self, product: &Product) -> Result<Arc<Dialect>> {
        let inner = self.read();
        inner
            .dialects
            .get(&product.key())
            .and_then(|versions| select(versions, product, |dialect| &dialect.product))
            .ok_or_else(|| Error::configuration(format!("no dialect registered for {product}")))
    }

    /// Returns the registered product named `name`, case-insensitively.
    pub fn product(&self, name: &str) -> Option<Product> {
        self.read().products.get(&name.to_lowercase()).cloned()
    }

    /// Detects a product from a driver name, falling back to ANSI.
    pub fn product_for_driver(&self, driver_name: &str) -> Product {
        let inner = self.read();

        let mut candidates: Vec<_> = inner
            .products
            .values()
            .filter(|product| product.name != products::ansi::NAME)
            .filter(|product| product.matches_driver(driver_name))
            .collect();
        // Longer names first so `mysql` does not shadow a product whose name
        // contains it.
        candidates.sort_by_key(|product| std::cmp::Reverse(product.name.len()));

        candidates
            .first()
            .map(|product| (*product).clone())
            .or_else(|| inner.products.get(&products::ansi::NAME.to_lowercase()).cloned())
            .unwrap_or_else(|| Product::new(products::ansi::NAME, driver_name))
    }

    /// All registered products.
    pub fn products(&self) -> Vec<Product> {
        let mut products: Vec<_> = self.read().products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        products
    }

    /// Every registered query, for inspection.
    pub fn queries(&self) -> Vec<Arc<MetadataQuery>> {
        self.read()
            .queries
            .values()
            .flat_map(|kinds| kinds.values())
            .flatten()
            .cloned()
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        // A poisoned lock only means a registration panicked midway; the maps
        // are still consistent entry by entry.
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Inserts `item` keeping `items` ordered by version. An entry for the same
/// version is replaced.
fn insert_by_version<T>(items: &mut Vec<Arc<T>>, item: Arc<T>, product: impl Fn(&T) -> &Product) {
    let version = |p: &Product| (p.major, p.minor);
    let new = version(product(&item));

    match items.binary_search_by_key(&new, |existing| version(product(existing))) {
        Ok(at) => items[at] = item,
        Err(at) => items.insert(at, item),
    }
}

fn select<T>(items: &[Arc<T>], requested: &Product, product: impl Fn(&T) -> &Product) -> Option<Arc<T>> {
    items
        .iter()
        .rev()
        .find(|item| {
            let p = product(item);
            requested.satisfies(p.major, p.minor)
        })
        .or_else(|| items.last())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UpsertStrategy;

    fn product(major: u32, minor: u32) -> Product {
        Product::new("Acme", "acme").with_version(major, minor)
    }

    #[test]
    fn selects_closest_lower_version() {
        let registry = Registry::new();
        registry.register_dialect(Dialect::new(product(1, 0)));
        registry.register_dialect(Dialect::new(product(2, 5)).with_upsert(UpsertStrategy::OnConflict));

        let dialect = registry.dialect(&product(2, 7)).unwrap();
        assert_eq!(dialect.upsert, UpsertStrategy::OnConflict);

        let dialect = registry.dialect(&product(2, 4)).unwrap();
        assert_eq!(dialect.upsert, UpsertStrategy::Undefined);
    }

    #[test]
    fn falls_back_to_latest() {
        let registry = Registry::new();
        registry.register_dialect(Dialect::new(product(3, 0)));
        registry.register_dialect(Dialect::new(product(5, 0)).with_quote('`'));

        let dialect = registry.dialect(&product(0, 0)).unwrap();
        assert_eq!(dialect.quote, '`');
    }

    #[test]
    fn unknown_kind() {
        let registry = Registry::new();
        registry
            .register_query(MetadataQuery::new(Kind::Version, "SELECT 1", product(1, 0)))
            .unwrap();

        let err = registry.lookup(&product(1, 0), Kind::Tables).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "unsupported kind: Tables for Acmev1");
    }

    #[test]
    fn version_query_registers_product() {
        let registry = Registry::new();
        registry
            .register_query(MetadataQuery::new(Kind::Version, "SELECT 1", product(1, 0)))
            .unwrap();
        assert_eq!(registry.product("ACME").unwrap().driver, "acme");
        assert_eq!(registry.product_for_driver("acme-driver").name, "Acme");
        assert_eq!(registry.product_for_driver("other").name, products::ansi::NAME);
    }
}
