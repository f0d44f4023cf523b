use super::{key, Cache, Entry, Lookup, Meta, Recorder};

use rand::Rng;
use serde::Deserialize;
use sqlkit_core::{async_trait, err, Error, Result, Value};

use std::{
    collections::{HashMap, VecDeque},
    fmt::Debug,
    sync::{Arc, Mutex},
    time::Duration,
};

/// A record of a key-value store holding one chunk of a cached result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KvRecord {
    pub sql: String,
    pub args: String,

    /// Rows of the chunk, one JSON array per line
    pub data: String,

    /// Entry meta, stored on the head chunk only
    pub fields: String,

    /// Key of the next chunk
    pub child: Option<String>,

    /// Expiry in seconds since the Unix epoch
    pub expires_at: Option<i64>,
}

/// Storage used by [`KvCache`].
#[async_trait]
pub trait KvStore: Debug + Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<KvRecord>>;

    async fn put(&self, key: &str, record: KvRecord) -> Result<()>;

    /// Stores `record` unless a live record exists under `key`. Returns
    /// `true` when stored.
    async fn put_if_absent(&self, key: &str, record: KvRecord) -> Result<bool>;

    /// Returns `true` when a record was removed.
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// In-process [`KvStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, KvRecord>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn len(&self) -> usize {
        let now = now_secs();
        self.lock()
            .values()
            .filter(|record| is_live(record, now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, KvRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<KvRecord>> {
        let now = now_secs();
        Ok(self
            .lock()
            .get(key)
            .filter(|record| is_live(record, now))
            .cloned())
    }

    async fn put(&self, key: &str, record: KvRecord) -> Result<()> {
        self.lock().insert(key.to_string(), record);
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, record: KvRecord) -> Result<bool> {
        let now = now_secs();
        let mut records = self.lock();
        if records.get(key).is_some_and(|existing| is_live(existing, now)) {
            return Ok(false);
        }
        records.insert(key.to_string(), record);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.lock().remove(key).is_some())
    }
}

/// Settings of a [`KvCache`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KvCacheConfig {
    /// Prefix of every key
    pub namespace: String,

    /// Entry time to live in seconds, `0` for no expiry
    pub ttl_secs: u64,

    /// Upper bound of row data bytes per chunk. A single row larger than
    /// the bound gets a chunk of its own.
    pub chunk_size: usize,

    /// Seconds after which an abandoned writer lock expires
    pub lock_lease_secs: u64,

    /// Entries written under a different signature are ignored
    pub signature: String,
}

impl Default for KvCacheConfig {
    fn default() -> KvCacheConfig {
        KvCacheConfig {
            namespace: "sqlkit".to_string(),
            ttl_secs: 0,
            chunk_size: 512 * 1024,
            lock_lease_secs: 60,
            signature: String::new(),
        }
    }
}

/// Cache storing each result set as a chain of chunks in a [`KvStore`].
///
/// A writer stores its chunks under a randomly suffixed key and publishes the
/// head chunk under the canonical key on close. The lock record is taken with
/// [`KvStore::put_if_absent`] and expires after the lease.
pub struct KvCache {
    store: Arc<dyn KvStore>,
    config: KvCacheConfig,
    recorder: Option<Arc<dyn Recorder>>,
}

impl core::fmt::Debug for KvCache {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("KvCache")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish()
    }
}

struct KvReader {
    rows: VecDeque<String>,
    child: Option<String>,
}

struct KvWriter {
    lock: String,
    suffixed: String,
    data: String,
    chunks: usize,
    head: Option<KvRecord>,
    previous: Option<(String, KvRecord)>,
    written: Vec<String>,
}

impl KvCache {
    pub fn new(store: Arc<dyn KvStore>, config: KvCacheConfig) -> KvCache {
        KvCache {
            store,
            config,
            recorder: None,
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn Recorder>) -> KvCache {
        self.recorder = Some(recorder);
        self
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    fn key(&self, sql: &str, args: &[Value]) -> String {
        format!("{}:{}", self.config.namespace, key(sql, args))
    }

    fn expires_at(&self) -> Option<i64> {
        (self.config.ttl_secs > 0).then(|| now_secs() + self.config.ttl_secs as i64)
    }

    fn chunk(&self, meta: &Meta, data: String) -> KvRecord {
        KvRecord {
            sql: meta.sql.clone(),
            args: meta.args.clone(),
            data,
            fields: String::new(),
            child: None,
            expires_at: self.expires_at(),
        }
    }

    /// Moves the buffered rows into a chunk, linking it to the previous one.
    async fn seal(&self, entry: &mut Entry) -> Result<()> {
        let meta = entry.meta.clone();
        let writer = entry.state_mut::<KvWriter>()?;
        let record = self.chunk(&meta, std::mem::take(&mut writer.data));

        if writer.head.is_none() {
            writer.head = Some(record);
            return Ok(());
        }

        writer.chunks += 1;
        let key = format!("{}#{}", writer.suffixed, writer.chunks);
        writer.written.push(key.clone());

        match writer.previous.take() {
            Some((previous_key, mut previous)) => {
                previous.child = Some(key.clone());
                self.store.put(&previous_key, previous).await?;
            }
            None => {
                if let Some(head) = &mut writer.head {
                    head.child = Some(key.clone());
                }
            }
        }
        writer.previous = Some((key, record));
        Ok(())
    }

    async fn delete_chain(&self, mut key: Option<String>) -> Result<()> {
        while let Some(current) = key {
            key = self.store.get(&current).await?.and_then(|record| record.child);
            self.store.delete(&current).await?;
        }
        Ok(())
    }

    async fn discard(&self, writer: KvWriter) -> Result<()> {
        for key in &writer.written {
            self.store.delete(key).await?;
        }
        self.store.delete(&writer.lock).await?;
        Ok(())
    }
}

#[async_trait]
impl Cache for KvCache {
    async fn get(&self, sql: &str, args: &[Value]) -> Result<Lookup> {
        let key = self.key(sql, args);

        if let Some(head) = self.store.get(&key).await? {
            match serde_json::from_str::<Meta>(&head.fields) {
                Ok(meta) if meta.is_valid_for(sql, args, &self.config.signature) => {
                    let reader = KvReader {
                        rows: head.data.lines().map(str::to_string).collect(),
                        child: head.child,
                    };
                    return Ok(Lookup::Hit(Entry::reader(key, meta, reader)));
                }
                _ => {
                    tracing::debug!(key, "discarding stale cache record");
                    self.delete_chain(Some(key.clone())).await?;
                }
            }
        }

        let lock = format!("{key}.lock");
        let lease = KvRecord {
            expires_at: Some(now_secs() + self.config.lock_lease_secs as i64),
            ..KvRecord::default()
        };
        if !self.store.put_if_absent(&lock, lease).await? {
            return Ok(Lookup::InUse);
        }

        let suffix: u64 = rand::thread_rng().gen();
        let writer = KvWriter {
            lock,
            suffixed: format!("{key}-{suffix:016x}"),
            data: String::new(),
            chunks: 0,
            head: None,
            previous: None,
            written: vec![],
        };
        let meta = Meta::new(
            sql,
            args,
            &self.config.signature,
            Duration::from_secs(self.config.ttl_secs),
        );
        Ok(Lookup::Miss(Entry::writer(key, meta, writer)))
    }

    async fn add_values(&self, entry: &mut Entry, values: &[Value]) -> Result<()> {
        if !entry.is_writable() || entry.is_finished() {
            return Err(err!("cache entry {} is not open for writing", entry.key()));
        }

        if !entry.meta.update_types(values) {
            return Err(Error::cache_mismatch(format!(
                "row types changed while writing {}",
                entry.key()
            )));
        }
        if let Some(recorder) = &self.recorder {
            recorder.record(&entry.meta, values);
        }

        let mut line = Meta::encode_row(values)?;
        line.push('\n');

        // a row that would overflow the chunk starts the next one
        let overflows = {
            let writer = entry.state_mut::<KvWriter>()?;
            !writer.data.is_empty() && writer.data.len() + line.len() > self.config.chunk_size
        };
        if overflows {
            self.seal(entry).await?;
        }

        let writer = entry.state_mut::<KvWriter>()?;
        writer.data.push_str(&line);
        let full = writer.data.len() >= self.config.chunk_size;
        entry.mark_row_added();

        if full {
            self.seal(entry).await?;
        }
        Ok(())
    }

    async fn next(&self, entry: &mut Entry) -> Result<Option<Vec<Value>>> {
        if !entry.is_readable() || entry.is_finished() {
            return Ok(None);
        }

        loop {
            let reader = entry.state_mut::<KvReader>()?;
            if let Some(line) = reader.rows.pop_front() {
                return entry.meta.decode_row(&line).map(Some);
            }

            let Some(child) = reader.child.take() else {
                return Ok(None);
            };
            let record = self
                .store
                .get(&child)
                .await?
                .ok_or_else(|| err!("cache chunk {child} is missing"))?;

            let reader = entry.state_mut::<KvReader>()?;
            reader.rows = record.data.lines().map(str::to_string).collect();
            reader.child = record.child;
        }
    }

    async fn close(&self, entry: &mut Entry) -> Result<()> {
        if entry.is_finished() || !entry.is_writable() {
            entry.mark_finished();
            return Ok(());
        }

        let res = async {
            let pending = {
                let writer = entry.state_mut::<KvWriter>()?;
                !writer.data.is_empty() || writer.head.is_none()
            };
            if pending {
                self.seal(entry).await?;
            }

            entry.meta.created = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
            let fields = serde_json::to_string(&entry.meta)?;

            let writer = entry.state_mut::<KvWriter>()?;
            if let Some((key, record)) = writer.previous.take() {
                self.store.put(&key, record).await?;
            }
            let mut head = writer
                .head
                .take()
                .ok_or_else(|| err!("cache entry has no head chunk"))?;
            head.fields = fields;
            self.store.put(entry.key(), head).await
        }
        .await;

        entry.mark_finished();
        let writer = entry
            .take_state::<KvWriter>()
            .ok_or_else(|| err!("cache entry {} has no writer state", entry.key()))?;

        match res {
            Ok(()) => {
                self.store.delete(&writer.lock).await?;
                Ok(())
            }
            Err(e) => {
                self.discard(writer).await?;
                Err(e)
            }
        }
    }

    async fn rollback(&self, entry: &mut Entry) -> Result<()> {
        if entry.is_writable() && entry.is_finished() {
            return self.delete(entry).await;
        }
        entry.mark_finished();

        match entry.take_state::<KvWriter>() {
            Some(writer) => self.discard(writer).await,
            None => Ok(()),
        }
    }

    async fn delete(&self, entry: &mut Entry) -> Result<()> {
        if entry.is_writable() && !entry.is_finished() {
            self.rollback(entry).await?;
        }
        entry.mark_finished();
        self.delete_chain(Some(entry.key().to_string())).await
    }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

fn is_live(record: &KvRecord, now: i64) -> bool {
    record.expires_at.map_or(true, |at| at > now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cache(chunk_size: usize) -> (Arc<MemoryStore>, KvCache) {
        let store = Arc::new(MemoryStore::new());
        let config = KvCacheConfig {
            chunk_size,
            ..KvCacheConfig::default()
        };
        (store.clone(), KvCache::new(store, config))
    }

    #[tokio::test]
    async fn chunks_chain_in_order() {
        let (store, cache) = cache(16);
        let Lookup::Miss(mut entry) = cache.get("SELECT n FROM t", &[]).await.unwrap() else {
            panic!("expected a writer");
        };

        for n in 0..10 {
            cache.add_values(&mut entry, &[Value::I64(n)]).await.unwrap();
        }
        // nothing is visible before close
        assert!(store.get(entry.key()).await.unwrap().is_none());
        cache.close(&mut entry).await.unwrap();

        let Lookup::Hit(mut entry) = cache.get("SELECT n FROM t", &[]).await.unwrap() else {
            panic!("expected a reader");
        };
        let mut read = vec![];
        while let Some(row) = cache.next(&mut entry).await.unwrap() {
            read.push(row[0].as_i64().unwrap());
        }
        assert_eq!(read, (0..10).collect::<Vec<_>>());

        cache.delete(&mut entry).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn single_flight() {
        let (store, cache) = cache(1024);
        let Lookup::Miss(mut writer) = cache.get("SELECT 1", &[]).await.unwrap() else {
            panic!("expected a writer");
        };
        assert!(matches!(cache.get("SELECT 1", &[]).await.unwrap(), Lookup::InUse));

        cache.add_values(&mut writer, &[Value::I64(1)]).await.unwrap();
        cache.rollback(&mut writer).await.unwrap();
        assert!(store.is_empty());

        assert!(matches!(cache.get("SELECT 1", &[]).await.unwrap(), Lookup::Miss(_)));
    }

    #[tokio::test]
    async fn empty_result_is_cached() {
        let (_, cache) = cache(1024);
        let Lookup::Miss(mut entry) = cache.get("SELECT 1 WHERE 0", &[]).await.unwrap() else {
            panic!("expected a writer");
        };
        cache.close(&mut entry).await.unwrap();

        let Lookup::Hit(mut entry) = cache.get("SELECT 1 WHERE 0", &[]).await.unwrap() else {
            panic!("expected a reader");
        };
        assert_eq!(cache.next(&mut entry).await.unwrap(), None);
    }

    #[tokio::test]
    async fn chunks_stay_within_budget() {
        let (store, cache) = cache(16);
        let Lookup::Miss(mut entry) = cache.get("SELECT big FROM t", &[]).await.unwrap() else {
            panic!("expected a writer");
        };

        // each row encodes to ten bytes
        let ids: Vec<i64> = (1_000_000..1_000_006).collect();
        for id in &ids {
            cache.add_values(&mut entry, &[Value::I64(*id)]).await.unwrap();
        }
        cache.close(&mut entry).await.unwrap();

        let mut chunks = 0;
        let mut next = Some(entry.key().to_string());
        while let Some(key) = next {
            let record = store.get(&key).await.unwrap().unwrap();
            assert!(record.data.len() <= 16, "chunk {key} holds {} bytes", record.data.len());
            chunks += 1;
            next = record.child;
        }
        assert_eq!(chunks, ids.len());

        let Lookup::Hit(mut entry) = cache.get("SELECT big FROM t", &[]).await.unwrap() else {
            panic!("expected a reader");
        };
        let mut read = vec![];
        while let Some(row) = cache.next(&mut entry).await.unwrap() {
            read.push(row[0].as_i64().unwrap());
        }
        assert_eq!(read, ids);
    }

    #[tokio::test]
    async fn type_change_while_writing_is_a_mismatch() {
        let (store, cache) = cache(1024);
        let Lookup::Miss(mut entry) = cache.get("SELECT v FROM mixed", &[]).await.unwrap() else {
            panic!("expected a writer");
        };
        cache.add_values(&mut entry, &[Value::I64(1)]).await.unwrap();

        let err = cache
            .add_values(&mut entry, &[Value::from("two")])
            .await
            .unwrap_err();
        assert!(err.is_cache_mismatch());

        cache.rollback(&mut entry).await.unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            cache.get("SELECT v FROM mixed", &[]).await.unwrap(),
            Lookup::Miss(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_gets_yield_one_writer() {
        let (store, cache) = cache(1024);
        let cache = Arc::new(cache);

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let cache = cache.clone();
            tasks.spawn(async move { cache.get("SELECT 7", &[]).await.unwrap() });
        }

        let mut writers = vec![];
        let mut in_use = 0;
        while let Some(lookup) = tasks.join_next().await {
            match lookup.unwrap() {
                Lookup::Miss(entry) => writers.push(entry),
                Lookup::InUse => in_use += 1,
                Lookup::Hit(_) => panic!("nothing was published"),
            }
        }
        assert_eq!(writers.len(), 1);
        assert_eq!(in_use, 7);

        cache.rollback(&mut writers[0]).await.unwrap();
        assert!(store.is_empty());
    }
}
