//! The store entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use redb::backends::InMemoryBackend;
use redb::{Database, Durability};
use tracing::info;

use crate::batch::{BatchFn, BatchStats, Batcher};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::txn::{ReadTxn, WriteTxn, RECORDS};

/// An ordered transactional bucket store.
///
/// Cheap to share behind an [`Arc`]; every method takes `&self`.
pub struct Store {
    db: Database,
    config: StoreConfig,
    batcher: Batcher,
}

impl Store {
    /// Opens (or creates) the database file named by `config.path`.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let path = config.path.clone().ok_or(StoreError::MissingPath)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(&path)?;
        info!(path = %path.display(), "opened store");
        Self::init(db, config)
    }

    /// Opens the database file at `path` with default settings.
    pub fn open_path(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(StoreConfig::new(path.as_ref()))
    }

    /// Creates an in-memory store with default settings.
    pub fn open_memory() -> StoreResult<Self> {
        Self::open_memory_with(StoreConfig::default())
    }

    /// Creates an in-memory store. `config.path` is ignored.
    pub fn open_memory_with(config: StoreConfig) -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::init(db, StoreConfig { path: None, ..config })
    }

    fn init(db: Database, config: StoreConfig) -> StoreResult<Self> {
        // Create the records table up front so read transactions can open it.
        let txn = db.begin_write()?;
        txn.open_table(RECORDS)?;
        txn.commit()?;

        Ok(Self {
            db,
            batcher: Batcher::new(config.batch, durability(&config)),
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the database file, or `None` for in-memory stores.
    pub fn path(&self) -> Option<&PathBuf> {
        self.config.path.as_ref()
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Runs `f` inside a read-only snapshot transaction.
    pub fn view<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&ReadTxn) -> Result<T, E>,
        E: From<StoreError>,
    {
        let txn = self.db.begin_read().map_err(StoreError::from)?;
        let tx = ReadTxn::open(&txn)?;
        f(&tx)
    }

    /// Runs `f` inside its own write transaction.
    ///
    /// The transaction commits if `f` returns `Ok` and is rolled back
    /// otherwise.
    pub fn update<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&WriteTxn<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut txn = self.db.begin_write().map_err(StoreError::from)?;
        txn.set_durability(durability(&self.config));

        let result = {
            let tx = WriteTxn::open(&txn)?;
            f(&tx)
        };

        match result {
            Ok(value) => {
                txn.commit().map_err(StoreError::from)?;
                Ok(value)
            }
            Err(e) => {
                let _ = txn.abort();
                Err(e)
            }
        }
    }

    /// Runs `f` inside a write transaction that may be shared with other
    /// concurrent `batch` calls, and blocks until that transaction commits.
    ///
    /// Everything `f` writes commits atomically, but writes from other calls
    /// in the same batch may commit with it. `f` may run more than once if
    /// another call in its batch fails, so it must not have side effects
    /// outside the transaction. Calling `batch` from inside `f` deadlocks.
    pub fn batch<F, T>(&self, mut f: F) -> StoreResult<T>
    where
        F: FnMut(&WriteTxn<'_>) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let slot = Arc::new(Mutex::new(None));
        let out = Arc::clone(&slot);
        let run: BatchFn = Box::new(move |tx| {
            let value = f(tx)?;
            *out.lock() = Some(value);
            Ok(())
        });

        self.batcher.submit(&self.db, run)?;
        let value = slot.lock().take();
        value.ok_or(StoreError::BatchAborted)
    }

    /// Runs every queued batch call now.
    pub fn flush(&self) {
        self.batcher.flush(&self.db);
    }

    /// Returns write batching counters.
    pub fn batch_stats(&self) -> BatchStats {
        self.batcher.stats()
    }
}

fn durability(config: &StoreConfig) -> Durability {
    if config.sync_writes {
        Durability::Immediate
    } else {
        Durability::None
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.config.path)
            .field("batcher", &self.batcher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn collect_values(store: &Store, name: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        store
            .view(|tx| match tx.bucket(name)? {
                Some(bucket) => bucket.cursor().collect::<StoreResult<Vec<_>>>(),
                None => Ok(Vec::new()),
            })
            .unwrap()
    }

    #[test]
    fn test_put_get_delete() {
        let store = Store::open_memory().unwrap();

        store
            .update(|tx| {
                let b = tx.create_bucket_if_not_exists(b"t")?;
                b.put(b"k1", b"v1")?;
                b.put(b"k2", b"")
            })
            .unwrap();

        store
            .view(|tx| {
                let b = tx.bucket(b"t")?.unwrap();
                assert_eq!(b.get(b"k1")?, Some(b"v1".to_vec()));
                assert_eq!(b.get(b"k2")?, Some(Vec::new()));
                assert_eq!(b.get(b"k3")?, None);
                Ok::<_, StoreError>(())
            })
            .unwrap();

        let removed = store
            .update(|tx| tx.bucket(b"t")?.unwrap().delete(b"k1"))
            .unwrap();
        assert!(removed);

        let again = store
            .update(|tx| tx.bucket(b"t")?.unwrap().delete(b"k1"))
            .unwrap();
        assert!(!again);
    }

    #[test]
    fn test_durability_follows_sync_writes() {
        let config = StoreConfig::default();
        assert!(matches!(durability(&config), Durability::Immediate));
        let config = config.with_sync_writes(false);
        assert!(matches!(durability(&config), Durability::None));
    }

    #[test]
    fn test_missing_bucket() {
        let store = Store::open_memory().unwrap();
        let found = store.view(|tx| Ok::<_, StoreError>(tx.bucket(b"nope")?.is_some()));
        assert!(!found.unwrap());
    }

    #[test]
    fn test_cursor_orders_values_and_skips_children() {
        let store = Store::open_memory().unwrap();
        store
            .update(|tx| {
                let b = tx.create_bucket_if_not_exists(b"t")?;
                b.put(b"b", b"2")?;
                b.put(b"a", b"1")?;
                b.put(b"c", b"3")?;
                let child = b.create_bucket_if_not_exists(b"a")?;
                child.put(b"inner", b"x")
            })
            .unwrap();

        let values = collect_values(&store, b"t");
        let keys: Vec<&[u8]> = values.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![&b"a"[..], &b"b"[..], &b"c"[..]]);
    }

    #[test]
    fn test_cursor_seek() {
        let store = Store::open_memory().unwrap();
        store
            .update(|tx| {
                let b = tx.create_bucket_if_not_exists(b"t")?;
                for key in [b"10", b"20", b"30"] {
                    b.put(key, b"")?;
                }
                Ok::<_, StoreError>(())
            })
            .unwrap();

        store
            .view(|tx| {
                let b = tx.bucket(b"t")?.unwrap();
                let mut cursor = b.cursor();
                assert_eq!(cursor.seek(b"15")?.map(|(k, _)| k), Some(b"20".to_vec()));
                assert_eq!(cursor.next().transpose()?.map(|(k, _)| k), Some(b"30".to_vec()));
                assert!(cursor.next().is_none());
                assert_eq!(cursor.seek(b"31")?, None);
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn test_delete_while_iterating() {
        let store = Store::open_memory().unwrap();
        store
            .update(|tx| {
                let b = tx.create_bucket_if_not_exists(b"t")?;
                for i in 0..20u8 {
                    b.put(&[i], &[i])?;
                }
                let mut seen = 0;
                for entry in b.cursor() {
                    let (key, _) = entry?;
                    assert!(b.delete(&key)?);
                    seen += 1;
                }
                assert_eq!(seen, 20);
                assert!(b.is_empty()?);
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn test_nested_buckets_and_delete_bucket() {
        let store = Store::open_memory().unwrap();
        store
            .update(|tx| {
                let t = tx.create_bucket_if_not_exists(b"t")?;
                for name in [&b"c"[..], &b"a"[..], &b"b\0"[..], &b"b"[..]] {
                    let child = t.create_bucket_if_not_exists(name)?;
                    child.put(b"k", name)?;
                    child.create_bucket_if_not_exists(b"deep")?.put(b"x", b"y")?;
                }
                t.put(b"plain", b"value")?;
                Ok::<_, StoreError>(())
            })
            .unwrap();

        let names = store
            .view(|tx| tx.bucket(b"t")?.unwrap().buckets().collect::<StoreResult<Vec<_>>>())
            .unwrap();
        assert_eq!(
            names,
            vec![b"a".to_vec(), b"b".to_vec(), b"b\0".to_vec(), b"c".to_vec()]
        );

        store
            .update(|tx| {
                let t = tx.bucket(b"t")?.unwrap();
                assert!(t.delete_bucket(b"b")?);
                assert!(!t.delete_bucket(b"b")?);
                Ok::<_, StoreError>(())
            })
            .unwrap();

        store
            .view(|tx| {
                let t = tx.bucket(b"t")?.unwrap();
                assert!(t.bucket(b"b")?.is_none());
                let sibling = t.bucket(b"b\0")?.unwrap();
                assert_eq!(sibling.get(b"k")?, Some(b"b\0".to_vec()));
                assert!(sibling.bucket(b"deep")?.is_some());
                assert_eq!(t.get(b"plain")?, Some(b"value".to_vec()));
                let names = t.buckets().collect::<StoreResult<Vec<_>>>()?;
                assert_eq!(names, vec![b"a".to_vec(), b"b\0".to_vec(), b"c".to_vec()]);
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn test_delete_buckets_while_iterating() {
        let store = Store::open_memory().unwrap();
        store
            .update(|tx| {
                let t = tx.create_bucket_if_not_exists(b"t")?;
                for name in [b"1", b"2", b"3"] {
                    t.create_bucket_if_not_exists(name)?.put(b"k", b"v")?;
                }
                let mut deleted = Vec::new();
                for name in t.buckets() {
                    let name = name?;
                    t.delete_bucket(&name)?;
                    deleted.push(name);
                }
                assert_eq!(deleted.len(), 3);
                assert!(t.is_empty()?);
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn test_update_rolls_back_on_error() {
        let store = Store::open_memory().unwrap();
        let result: Result<(), StoreError> = store.update(|tx| {
            tx.create_bucket_if_not_exists(b"t")?.put(b"k", b"v")?;
            Err(StoreError::BatchAborted)
        });
        assert!(result.is_err());
        assert!(collect_values(&store, b"t").is_empty());
    }

    #[test]
    fn test_snapshot_isolation() {
        let store = Store::open_memory().unwrap();
        store
            .update(|tx| tx.create_bucket_if_not_exists(b"t")?.put(b"k", b"old"))
            .unwrap();

        store
            .view(|tx| {
                store
                    .update(|w| w.bucket(b"t")?.unwrap().put(b"k", b"new"))
                    .unwrap();
                let seen = tx.bucket(b"t")?.unwrap().get(b"k")?;
                assert_eq!(seen, Some(b"old".to_vec()));
                Ok::<_, StoreError>(())
            })
            .unwrap();

        assert_eq!(collect_values(&store, b"t"), vec![(b"k".to_vec(), b"new".to_vec())]);
    }

    #[test]
    fn test_batch_returns_value() {
        let store = Store::open_memory_with(
            StoreConfig::default().with_batch_max_delay(Duration::from_millis(1)),
        )
        .unwrap();

        let n = store
            .batch(|tx| {
                let b = tx.create_bucket_if_not_exists(b"t")?;
                b.put(b"k", b"v")?;
                Ok(7u32)
            })
            .unwrap();
        assert_eq!(n, 7);
        assert_eq!(collect_values(&store, b"t").len(), 1);
        assert_eq!(store.batch_stats().calls, 1);
    }

    #[test]
    fn test_batch_coalesces_concurrent_writers() {
        let store = Arc::new(
            Store::open_memory_with(
                StoreConfig::default()
                    .with_batch_max_size(8)
                    .with_batch_max_delay(Duration::from_millis(200)),
            )
            .unwrap(),
        );
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store
                        .batch(move |tx| tx.create_bucket_if_not_exists(b"t")?.put(&[i], &[i]))
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(collect_values(&store, b"t").len(), 8);
        let stats = store.batch_stats();
        assert_eq!(stats.calls, 8);
        assert!(stats.batches < 8);
    }

    #[test]
    fn test_batch_failure_isolated() {
        let store = Arc::new(
            Store::open_memory_with(
                StoreConfig::default()
                    .with_batch_max_size(2)
                    .with_batch_max_delay(Duration::from_secs(5)),
            )
            .unwrap(),
        );

        let failing = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.batch(|tx| {
                    tx.create_bucket_if_not_exists(b"bad")?.put(b"k", b"v")?;
                    Err::<(), _>(StoreError::batch_failed("boom"))
                })
            })
        };
        let ok = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.batch(|tx| tx.create_bucket_if_not_exists(b"good")?.put(b"k", b"v"))
            })
        };

        assert!(failing.join().unwrap().is_err());
        assert!(ok.join().unwrap().is_ok());
        assert!(collect_values(&store, b"bad").is_empty());
        assert_eq!(collect_values(&store, b"good").len(), 1);
    }

    #[test]
    fn test_file_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tabula.redb");

        {
            let store = Store::open_path(&path).unwrap();
            store
                .update(|tx| tx.create_bucket_if_not_exists(b"t")?.put(b"k", b"v"))
                .unwrap();
        }

        let store = Store::open(StoreConfig::new(&path)).unwrap();
        assert_eq!(store.path(), Some(&path));
        assert_eq!(collect_values(&store, b"t"), vec![(b"k".to_vec(), b"v".to_vec())]);
    }

    #[test]
    fn test_open_requires_path() {
        let err = Store::open(StoreConfig::default()).unwrap_err();
        assert!(matches!(err, StoreError::MissingPath));
    }
}
