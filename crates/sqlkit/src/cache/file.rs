use super::{key, now_nanos, Cache, Entry, Lookup, Meta, Recorder};

use serde::Deserialize;
use sqlkit_core::{async_trait, err, Error, Result, Value};
use tokio::{
    fs,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines},
};

use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, SystemTime},
};

/// Settings of a [`FileCache`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileCacheConfig {
    /// Directory holding one file per cached query
    pub dir: PathBuf,

    /// Entry time to live in seconds, `0` for no expiry
    pub ttl_secs: u64,

    /// Seconds after which an abandoned writer lock is broken
    pub lock_lease_secs: u64,

    /// Entries written under a different signature are ignored
    pub signature: String,
}

impl Default for FileCacheConfig {
    fn default() -> FileCacheConfig {
        FileCacheConfig {
            dir: std::env::temp_dir().join("sqlkit-cache"),
            ttl_secs: 0,
            lock_lease_secs: 60,
            signature: String::new(),
        }
    }
}

/// Cache storing each result set as a file: a JSON meta line followed by one
/// JSON array per row.
///
/// Writers stream rows into a scratch file. On close the meta line and the
/// rows are copied into a uniquely named temporary file which is renamed into
/// place. A `.lock` file created exclusively next to the entry keeps a single
/// writer per key across processes.
pub struct FileCache {
    config: FileCacheConfig,

    /// Keys this process is writing
    writing: Arc<Mutex<HashSet<String>>>,

    recorder: Option<Arc<dyn Recorder>>,
}

impl core::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("FileCache")
            .field("config", &self.config)
            .field("recorder", &self.recorder.is_some())
            .finish()
    }
}

struct FileReader {
    lines: Lines<BufReader<fs::File>>,
}

struct FileWriter {
    rows: BufWriter<fs::File>,
    rows_path: PathBuf,
    claim: Claim,
}

/// Writer ownership of one key.
///
/// Dropping the claim frees the key for this process and removes the lock
/// and scratch files still on disk, so an abandoned writer entry never keeps
/// the key busy.
struct Claim {
    key: String,
    writing: Arc<Mutex<HashSet<String>>>,
    lock: Option<PathBuf>,
    scratch: Vec<PathBuf>,
}

impl Claim {
    fn new(key: &str, writing: &Arc<Mutex<HashSet<String>>>, lock: PathBuf) -> Claim {
        claimed(writing).insert(key.to_string());
        Claim {
            key: key.to_string(),
            writing: writing.clone(),
            lock: Some(lock),
            scratch: vec![],
        }
    }

    /// Removes the lock file ahead of the drop.
    async fn release(&mut self) -> Result<()> {
        match self.lock.take() {
            Some(lock) => remove(&lock).await,
            None => Ok(()),
        }
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        for path in self.scratch.drain(..).chain(self.lock.take()) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove cache file");
                }
            }
        }
        claimed(&self.writing).remove(&self.key);
    }
}

fn claimed(writing: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    writing
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl FileCache {
    pub async fn new(config: FileCacheConfig) -> Result<FileCache> {
        fs::create_dir_all(&config.dir).await?;
        Ok(FileCache {
            config,
            writing: Arc::new(Mutex::new(HashSet::new())),
            recorder: None,
        })
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn Recorder>) -> FileCache {
        self.recorder = Some(recorder);
        self
    }

    pub fn config(&self) -> &FileCacheConfig {
        &self.config
    }

    fn path(&self, key: &str) -> PathBuf {
        self.config.dir.join(key)
    }

    fn scratch_path(&self, key: &str) -> PathBuf {
        self.path(&format!("{key}.{}", uuid::Uuid::new_v4()))
    }

    async fn open_reader(&self, key: &str, sql: &str, args: &[Value]) -> Result<Option<Entry>> {
        let path = self.path(key);
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut lines = BufReader::new(file).lines();
        let meta = match lines.next_line().await? {
            Some(line) => serde_json::from_str::<Meta>(&line).ok(),
            None => None,
        };

        match meta {
            Some(meta) if meta.is_valid_for(sql, args, &self.config.signature) => {
                Ok(Some(Entry::reader(key, meta, FileReader { lines })))
            }
            _ => {
                tracing::debug!(key, "discarding stale cache file");
                remove(&path).await?;
                Ok(None)
            }
        }
    }

    /// Takes the writer lock of `key`. Returns `None` when another writer
    /// holds a live lock.
    async fn lock(&self, key: &str) -> Result<Option<PathBuf>> {
        let lock = self.path(&format!("{key}.lock"));

        for _ in 0..2 {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock)
                .await
            {
                Ok(_) => return Ok(Some(lock)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !self.is_stale(&lock).await {
                        return Ok(None);
                    }
                    tracing::debug!(lock = %lock.display(), "breaking abandoned cache lock");
                    remove(&lock).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }

    async fn is_stale(&self, lock: &Path) -> bool {
        let lease = Duration::from_secs(self.config.lock_lease_secs);
        let Ok(modified) = fs::metadata(lock).await.and_then(|m| m.modified()) else {
            return false;
        };
        SystemTime::now()
            .duration_since(modified)
            .map(|age| age > lease)
            .unwrap_or(false)
    }

    /// Writes the meta line and the streamed rows to a temporary file, then
    /// renames it over the entry.
    async fn publish(&self, entry: &Entry, writer: &mut FileWriter) -> Result<()> {
        writer.rows.flush().await?;

        let tmp = self.scratch_path(entry.key());
        writer.claim.scratch.push(tmp.clone());

        let mut out = BufWriter::new(fs::File::create(&tmp).await?);
        out.write_all(serde_json::to_string(&entry.meta)?.as_bytes())
            .await?;
        out.write_all(b"\n").await?;
        let mut rows = fs::File::open(&writer.rows_path).await?;
        tokio::io::copy(&mut rows, &mut out).await?;
        out.flush().await?;
        drop(out);

        fs::rename(&tmp, self.path(entry.key())).await?;
        writer.claim.scratch.retain(|path| *path != tmp);
        Ok(())
    }
}

#[async_trait]
impl Cache for FileCache {
    async fn get(&self, sql: &str, args: &[Value]) -> Result<Lookup> {
        let key = key(sql, args);

        if claimed(&self.writing).contains(&key) {
            return Ok(Lookup::InUse);
        }

        if let Some(entry) = self.open_reader(&key, sql, args).await? {
            return Ok(Lookup::Hit(entry));
        }

        let Some(lock) = self.lock(&key).await? else {
            return Ok(Lookup::InUse);
        };
        let mut claim = Claim::new(&key, &self.writing, lock);

        let rows_path = self.scratch_path(&key);
        claim.scratch.push(rows_path.clone());
        let rows = BufWriter::new(fs::File::create(&rows_path).await?);

        let meta = Meta::new(
            sql,
            args,
            &self.config.signature,
            Duration::from_secs(self.config.ttl_secs),
        );
        Ok(Lookup::Miss(Entry::writer(
            key,
            meta,
            FileWriter {
                rows,
                rows_path,
                claim,
            },
        )))
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
        let writer = entry.state_mut::<FileWriter>()?;
        writer.rows.write_all(line.as_bytes()).await?;
        entry.mark_row_added();
        Ok(())
    }

    async fn next(&self, entry: &mut Entry) -> Result<Option<Vec<Value>>> {
        if !entry.is_readable() || entry.is_finished() {
            return Ok(None);
        }

        let line = entry.state_mut::<FileReader>()?.lines.next_line().await?;
        match line {
            Some(line) => entry.meta.decode_row(&line).map(Some),
            None => Ok(None),
        }
    }

    async fn close(&self, entry: &mut Entry) -> Result<()> {
        if entry.is_finished() {
            return Ok(());
        }
        entry.mark_finished();

        let Some(mut writer) = entry.take_state::<FileWriter>() else {
            // readers hold nothing worth keeping
            entry.take_state::<FileReader>();
            return Ok(());
        };

        entry.meta.created = now_nanos();
        self.publish(entry, &mut writer).await?;
        writer.claim.release().await
    }

    async fn rollback(&self, entry: &mut Entry) -> Result<()> {
        if entry.is_writable() && entry.is_finished() {
            return self.delete(entry).await;
        }
        entry.mark_finished();

        match entry.take_state::<FileWriter>() {
            Some(mut writer) => writer.claim.release().await,
            None => Ok(()),
        }
    }

    async fn delete(&self, entry: &mut Entry) -> Result<()> {
        if entry.is_writable() && !entry.is_finished() {
            self.rollback(entry).await?;
        }
        entry.mark_finished();
        remove(&self.path(entry.key())).await
    }
}

async fn remove(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn cache(dir: &tempfile::TempDir) -> FileCache {
        FileCache::new(FileCacheConfig {
            dir: dir.path().to_path_buf(),
            ..FileCacheConfig::default()
        })
        .await
        .unwrap()
    }

    fn rows() -> Vec<Vec<Value>> {
        vec![
            vec![Value::I64(1), Value::from("a")],
            vec![Value::I64(2), Value::Null],
        ]
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;
        let sql = "SELECT id, name FROM t WHERE k = ?";
        let args = [Value::I64(9)];

        let Lookup::Miss(mut entry) = cache.get(sql, &args).await.unwrap() else {
            panic!("expected a writer");
        };
        for row in rows() {
            cache.add_values(&mut entry, &row).await.unwrap();
        }
        cache.close(&mut entry).await.unwrap();
        cache.close(&mut entry).await.unwrap();

        let Lookup::Hit(mut entry) = cache.get(sql, &args).await.unwrap() else {
            panic!("expected a reader");
        };
        let mut read = vec![];
        while let Some(row) = cache.next(&mut entry).await.unwrap() {
            read.push(row);
        }
        assert_eq!(read, rows());
    }

    #[tokio::test]
    async fn second_writer_is_turned_away() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;

        let Lookup::Miss(mut entry) = cache.get("SELECT 1", &[]).await.unwrap() else {
            panic!("expected a writer");
        };
        assert!(matches!(cache.get("SELECT 1", &[]).await.unwrap(), Lookup::InUse));

        cache.rollback(&mut entry).await.unwrap();
        assert!(matches!(cache.get("SELECT 1", &[]).await.unwrap(), Lookup::Miss(_)));
    }

    #[tokio::test]
    async fn rollback_after_close_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;

        let Lookup::Miss(mut entry) = cache.get("SELECT 2", &[]).await.unwrap() else {
            panic!("expected a writer");
        };
        cache.add_values(&mut entry, &[Value::I64(2)]).await.unwrap();
        cache.close(&mut entry).await.unwrap();
        assert!(dir.path().join(entry.key()).exists());

        cache.rollback(&mut entry).await.unwrap();
        assert!(!dir.path().join(entry.key()).exists());
    }

    #[tokio::test]
    async fn other_signature_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;

        let Lookup::Miss(mut entry) = cache.get("SELECT 3", &[]).await.unwrap() else {
            panic!("expected a writer");
        };
        cache.add_values(&mut entry, &[Value::I64(3)]).await.unwrap();
        cache.close(&mut entry).await.unwrap();

        let v2 = FileCache::new(FileCacheConfig {
            dir: dir.path().to_path_buf(),
            signature: "v2".into(),
            ..FileCacheConfig::default()
        })
        .await
        .unwrap();
        let Lookup::Miss(mut entry) = v2.get("SELECT 3", &[]).await.unwrap() else {
            panic!("expected a writer");
        };
        v2.rollback(&mut entry).await.unwrap();
    }

    #[tokio::test]
    async fn type_change_while_writing_is_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;

        let Lookup::Miss(mut entry) = cache.get("SELECT v FROM mixed", &[]).await.unwrap() else {
            panic!("expected a writer");
        };
        cache.add_values(&mut entry, &[Value::I64(1)]).await.unwrap();
        cache.add_values(&mut entry, &[Value::Null]).await.unwrap();

        let err = cache
            .add_values(&mut entry, &[Value::from("two")])
            .await
            .unwrap_err();
        assert!(err.is_cache_mismatch());

        cache.rollback(&mut entry).await.unwrap();
        assert!(!dir.path().join(entry.key()).exists());

        let Lookup::Miss(mut entry) = cache.get("SELECT v FROM mixed", &[]).await.unwrap() else {
            panic!("a mismatched writer must not publish");
        };
        cache.rollback(&mut entry).await.unwrap();
    }

    #[tokio::test]
    async fn dropped_writer_frees_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;

        let Lookup::Miss(mut entry) = cache.get("SELECT 5", &[]).await.unwrap() else {
            panic!("expected a writer");
        };
        cache.add_values(&mut entry, &[Value::I64(5)]).await.unwrap();
        let key = entry.key().to_string();
        drop(entry);

        assert!(!dir.path().join(format!("{key}.lock")).exists());
        let names: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(names.is_empty());

        let Lookup::Miss(mut entry) = cache.get("SELECT 5", &[]).await.unwrap() else {
            panic!("expected the key to be free again");
        };
        cache.rollback(&mut entry).await.unwrap();
    }

    #[tokio::test]
    async fn close_leaves_only_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;

        let Lookup::Miss(mut entry) = cache.get("SELECT 6", &[]).await.unwrap() else {
            panic!("expected a writer");
        };
        for row in rows() {
            cache.add_values(&mut entry, &row).await.unwrap();
        }
        cache.close(&mut entry).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, [entry.key().to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_gets_yield_one_writer() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(cache(&dir).await);

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
    }
}
