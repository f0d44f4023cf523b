//! Process-wide cache of column bindings.
//!
//! Bindings are keyed on the record type signature followed by every column
//! name. The cache keeps two generations: inserts fill the active one, and
//! once it is full the generations swap and the new active one starts empty.

use crate::matcher::{self, Matcher, Resolver, Slot};

use sqlkit_core::{hash::fnv64, Column, Record, Result};

use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock},
};

/// Default number of bindings kept per generation.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct MapperCache {
    generations: Mutex<Generations>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct Generations {
    active: Generation,
    standby: Generation,
}

#[derive(Debug, Default)]
struct Generation {
    index: HashMap<u64, usize>,
    entries: Vec<Arc<Entry>>,
}

struct Entry {
    /// Unhashed key, compared on hit to reject collisions
    raw_key: String,

    /// Every matched column agrees with its field's scan type
    type_matches: bool,

    /// `Vec<Slot<T>>` for the record type in the key
    slots: Arc<dyn Any + Send + Sync>,
}

impl core::fmt::Debug for Entry {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Entry")
            .field("raw_key", &self.raw_key)
            .field("type_matches", &self.type_matches)
            .finish()
    }
}

impl Generation {
    fn get(&self, key: u64, raw_key: &str) -> Option<Arc<Entry>> {
        let entry = self.entries.get(*self.index.get(&key)?)?;
        (entry.raw_key == raw_key).then(|| entry.clone())
    }
}

impl MapperCache {
    pub fn new(capacity: usize) -> MapperCache {
        MapperCache {
            generations: Mutex::new(Generations::default()),
            capacity: capacity.max(1),
        }
    }

    /// The cache shared by every [`Db`](crate::Db) in the process.
    pub fn global() -> &'static MapperCache {
        static GLOBAL: OnceLock<MapperCache> = OnceLock::new();
        GLOBAL.get_or_init(|| MapperCache::new(DEFAULT_CAPACITY))
    }

    /// Cache key of a record type and column sequence.
    pub fn key(signature: &str, columns: &[Column]) -> String {
        let mut key = String::from(signature);
        for column in columns {
            key.push('/');
            key.push_str(column.name());
        }
        key
    }

    /// Returns the bindings of `columns` for `T`, matching them on a miss.
    /// On a hit the field slots are checked against the scan types of
    /// `columns` again, leaving the cached bindings untouched.
    ///
    /// Unmatched columns are bound to `resolver` on every call, so a cached
    /// binding never holds a caller's resolver.
    pub fn slots<T: Record>(
        &self,
        columns: &[Column],
        resolver: Option<&dyn Resolver>,
    ) -> Result<Vec<Slot<T>>> {
        let raw_key = MapperCache::key(T::type_signature(), columns);
        let key = fnv64(raw_key.as_bytes());

        let slots = match self.lookup(key, &raw_key) {
            Some(entry) => match entry.slots.downcast_ref::<Vec<Slot<T>>>() {
                Some(slots) => {
                    // the key carries names only, so column types are checked per call
                    let mut slots = slots.clone();
                    let mismatched = matcher::recheck(&mut slots, columns);
                    tracing::trace!(
                        key = %raw_key,
                        cached_type_matches = entry.type_matches,
                        mismatched,
                        "mapper cache hit"
                    );
                    slots
                }
                None => self.fill::<T>(key, raw_key, columns)?,
            },
            None => self.fill::<T>(key, raw_key, columns)?,
        };

        matcher::bind(slots, resolver)
    }

    /// Number of cached bindings across both generations.
    pub fn len(&self) -> usize {
        let generations = self.lock();
        generations.active.entries.len() + generations.standby.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fill<T: Record>(&self, key: u64, raw_key: String, columns: &[Column]) -> Result<Vec<Slot<T>>> {
        let slots = Matcher::<T>::for_record()?.match_columns(columns);
        let type_matches = slots.iter().all(|slot| match slot {
            Slot::Field { type_matches, .. } => *type_matches,
            _ => true,
        });

        tracing::trace!(key = %raw_key, type_matches, "mapper cache miss");

        self.insert(
            key,
            Entry {
                raw_key,
                type_matches,
                slots: Arc::new(slots.clone()),
            },
        );
        Ok(slots)
    }

    fn lookup(&self, key: u64, raw_key: &str) -> Option<Arc<Entry>> {
        let generations = self.lock();
        generations
            .active
            .get(key, raw_key)
            .or_else(|| generations.standby.get(key, raw_key))
    }

    fn insert(&self, key: u64, entry: Entry) {
        let mut generations = self.lock();

        if generations.active.entries.len() >= self.capacity {
            let generations = &mut *generations;
            std::mem::swap(&mut generations.active, &mut generations.standby);
            generations.active = Generation::default();
        }

        let active = &mut generations.active;
        active.index.insert(key, active.entries.len());
        active.entries.push(Arc::new(entry));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Generations> {
        self.generations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MapperCache {
    fn default() -> MapperCache {
        MapperCache::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Unmapped;
    use sqlkit_core::ScanType;

    #[derive(Debug, Default, sqlkit::Record)]
    struct Item {
        id: i64,
        name: String,
    }

    #[test]
    fn hit_returns_equal_bindings() {
        let cache = MapperCache::new(8);
        let columns = Column::from_names(&["id", "name"]);

        let first = cache.slots::<Item>(&columns, None).unwrap();
        let second = cache.slots::<Item>(&columns, None).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(first[1].field().unwrap().path, second[1].field().unwrap().path);
    }

    #[test]
    fn resolver_is_bound_per_call() {
        let cache = MapperCache::new(8);
        let columns = Column::from_names(&["id", "extra"]);

        assert!(cache.slots::<Item>(&columns, None).unwrap_err().is_unmatched_columns());

        let unmapped = Unmapped::new();
        let slots = cache.slots::<Item>(&columns, Some(&unmapped)).unwrap();
        assert!(matches!(slots[1], Slot::Resolved { .. }));

        assert!(cache.slots::<Item>(&columns, None).is_err());
    }

    #[test]
    fn generations_rotate() {
        let cache = MapperCache::new(2);
        for i in 0..5 {
            let columns = Column::from_names(&[format!("id{i}")]);
            let _ = cache.slots::<Item>(&columns, Some(&Unmapped::new()));
        }
        assert!(cache.len() <= 4);

        // the latest binding survives rotation
        let columns = Column::from_names(&["id4"]);
        let raw_key = MapperCache::key(Item::type_signature(), &columns);
        assert!(cache.lookup(fnv64(raw_key.as_bytes()), &raw_key).is_some());
    }

    fn type_matches(slot: &Slot<Item>) -> bool {
        matches!(slot, Slot::Field { type_matches: true, .. })
    }

    #[test]
    fn hit_rechecks_column_types() {
        let cache = MapperCache::new(8);
        let untyped = Column::from_names(&["id", "name"]);
        let typed = vec![
            Column::new("id").with_scan_type(ScanType::String),
            Column::new("name").with_scan_type(ScanType::String),
        ];

        let slots = cache.slots::<Item>(&untyped, None).unwrap();
        assert!(slots.iter().all(type_matches));

        let slots = cache.slots::<Item>(&typed, None).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(!type_matches(&slots[0]));
        assert!(type_matches(&slots[1]));

        // the cached binding is left as matched
        let slots = cache.slots::<Item>(&untyped, None).unwrap();
        assert!(slots.iter().all(type_matches));
    }
}
