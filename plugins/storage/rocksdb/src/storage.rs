use std::path::{Path, PathBuf};
use std::sync::Arc;

use rocksdb::{BlockBasedOptions, DB, Direction, IteratorMode, Options, WriteBatch, WriteOptions};
use tokio::sync::RwLock;

use queue_api::{KvFuture, KvOp, KvStore, Removal, StorageError};

// ════════════════════════════════════════════════════════════════
//  RocksStorage
// ════════════════════════════════════════════════════════════════

/// Durable KV поверх RocksDB.
///
/// Вызовы RocksDB блокирующие, поэтому каждая операция уходит в
/// `spawn_blocking`. Read-guard переезжает внутрь blocking-задачи и
/// живёт до её конца, даже если вызвавший future отменён: `destroy()`
/// берёт write-guard и тем самым дожидается всех текущих вызовов,
/// после чего закрывает базу и удаляет директорию.
pub struct RocksStorage {
    db: Arc<RwLock<Option<DB>>>,
    path: PathBuf,
    sync_writes: bool,
}

impl RocksStorage {
    pub fn open(path: impl AsRef<Path>, sync_writes: bool) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)
            .map_err(|e| StorageError::io(format!("mkdir {}: {e}", path.display())))?;

        let db = DB::open(&Self::db_options(), &path).map_err(rocks_err)?;
        tracing::info!(path = %path.display(), sync_writes, "opened rocksdb storage");

        Ok(Self {
            db: Arc::new(RwLock::new(Some(db))),
            path,
            sync_writes,
        })
    }

    fn db_options() -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        // Все чтения точечные — bloom filter экономит обращения к диску.
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_cache_index_and_filter_blocks(true);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn write_opts(sync: bool) -> WriteOptions {
        let mut wo = WriteOptions::default();
        wo.set_sync(sync);
        wo
    }

    /// Выполнить `f` на blocking-пуле, удерживая базу открытой.
    async fn with_db<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&DB) -> Result<T, rocksdb::Error> + Send + 'static,
    {
        let guard = self.db.clone().read_owned().await;
        if guard.is_none() {
            return Err(StorageError::closed());
        }
        tokio::task::spawn_blocking(move || match guard.as_ref() {
            Some(db) => f(db).map_err(rocks_err),
            None => Err(StorageError::closed()),
        })
        .await
        .map_err(|e| StorageError::io(format!("blocking task: {e}")))?
    }
}

// ════════════════════════════════════════════════════════════════
//  KvStore impl
// ════════════════════════════════════════════════════════════════

impl KvStore for RocksStorage {
    fn get(&self, key: &[u8]) -> KvFuture<'_, Option<Vec<u8>>> {
        let key = key.to_vec();
        Box::pin(self.with_db(move |db| db.get(&key)))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> KvFuture<'_, ()> {
        let key = key.to_vec();
        let value = value.to_vec();
        let sync = self.sync_writes;
        Box::pin(self.with_db(move |db| db.put_opt(&key, &value, &Self::write_opts(sync))))
    }

    fn delete(&self, key: &[u8]) -> KvFuture<'_, Removal> {
        let key = key.to_vec();
        let sync = self.sync_writes;
        Box::pin(self.with_db(move |db| {
            if db.get_pinned(&key)?.is_none() {
                return Ok(Removal::NotPresent);
            }
            db.delete_opt(&key, &Self::write_opts(sync))?;
            Ok(Removal::Deleted)
        }))
    }

    fn has(&self, key: &[u8]) -> KvFuture<'_, bool> {
        let key = key.to_vec();
        Box::pin(self.with_db(move |db| Ok(db.get_pinned(&key)?.is_some())))
    }

    fn write_batch(&self, ops: Vec<KvOp>) -> KvFuture<'_, ()> {
        let sync = self.sync_writes;
        Box::pin(self.with_db(move |db| {
            let mut batch = WriteBatch::default();
            for op in ops {
                match op {
                    KvOp::Put { key, value } => batch.put(key, value),
                    KvOp::Delete { key } => batch.delete(key),
                }
            }
            db.write_opt(batch, &Self::write_opts(sync))
        }))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> KvFuture<'_, Vec<(Vec<u8>, Vec<u8>)>> {
        let prefix = prefix.to_vec();
        Box::pin(self.with_db(move |db| {
            let mut out = Vec::new();
            for pair in db.iterator(IteratorMode::From(prefix.as_slice(), Direction::Forward)) {
                let (key, value) = pair?;
                if !key.starts_with(&prefix) {
                    break;
                }
                out.push((key.into_vec(), value.into_vec()));
            }
            Ok(out)
        }))
    }

    fn flush(&self) -> KvFuture<'_, ()> {
        Box::pin(self.with_db(|db| db.flush()))
    }

    fn destroy(&self) -> KvFuture<'_, ()> {
        Box::pin(async move {
            let mut guard = self.db.write().await;
            let Some(db) = guard.take() else {
                return Ok(());
            };
            // Под write-guard ни одна blocking-задача базу не держит.
            drop(db);

            let path = self.path.clone();
            tokio::task::spawn_blocking(move || DB::destroy(&Options::default(), &path))
                .await
                .map_err(|e| StorageError::io(format!("blocking task: {e}")))?
                .map_err(rocks_err)?;
            if self.path.exists() {
                std::fs::remove_dir_all(&self.path)
                    .map_err(|e| StorageError::io(format!("rm {}: {e}", self.path.display())))?;
            }
            tracing::info!(path = %self.path.display(), "destroyed rocksdb storage");
            Ok(())
        })
    }
}

// ════════════════════════════════════════════════════════════════
//  Helpers
// ════════════════════════════════════════════════════════════════

fn rocks_err(e: rocksdb::Error) -> StorageError {
    match e.kind() {
        rocksdb::ErrorKind::Corruption => StorageError::corruption(e.to_string()),
        rocksdb::ErrorKind::InvalidArgument | rocksdb::ErrorKind::NotSupported => {
            StorageError::config(e.to_string())
        }
        _ => StorageError::io(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use queue_api::ErrorKind;

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let s = RocksStorage::open(dir.path(), true).unwrap();
            s.write_batch(vec![KvOp::put(b"log:t:0".to_vec(), b"a".to_vec()), KvOp::put(b"meta:t".to_vec(), b"m".to_vec())])
                .await
                .unwrap();
        }

        let s = RocksStorage::open(dir.path(), true).unwrap();
        assert_eq!(s.get(b"log:t:0").await.unwrap(), Some(b"a".to_vec()));
        assert!(s.has(b"meta:t").await.unwrap());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let s = RocksStorage::open(dir.path(), false).unwrap();
        s.put(b"k", b"v").await.unwrap();

        assert_eq!(s.delete(b"k").await.unwrap(), Removal::Deleted);
        assert_eq!(s.delete(b"k").await.unwrap(), Removal::NotPresent);
    }

    #[tokio::test]
    async fn scan_prefix_is_ordered_and_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let s = RocksStorage::open(dir.path(), false).unwrap();
        for key in [&b"p:2"[..], b"q:0", b"p:1", b"o:9"] {
            s.put(key, b"").await.unwrap();
        }

        let keys: Vec<Vec<u8>> = s.scan_prefix(b"p:").await.unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"p:1".to_vec(), b"p:2".to_vec()]);
    }

    #[tokio::test]
    async fn destroy_waits_for_abandoned_blocking_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        let s = Arc::new(RocksStorage::open(&path, false).unwrap());

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let call = tokio::spawn({
            let s = s.clone();
            async move {
                s.with_db(move |_db| {
                    let _ = started_tx.send(());
                    let _ = release_rx.recv();
                    Ok(())
                })
                .await
            }
        });
        started_rx.await.unwrap();
        call.abort();
        assert!(call.await.unwrap_err().is_cancelled());

        let destroy = tokio::spawn({
            let s = s.clone();
            async move { s.destroy().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!destroy.is_finished());
        assert!(path.exists());

        release_tx.send(()).unwrap();
        destroy.await.unwrap().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn destroy_removes_directory_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        let s = RocksStorage::open(&path, false).unwrap();
        s.put(b"k", b"v").await.unwrap();

        s.destroy().await.unwrap();
        assert!(!path.exists());
        assert_eq!(s.get(b"k").await.unwrap_err().kind(), ErrorKind::Closed);

        // second destroy is a no-op
        s.destroy().await.unwrap();
    }
}
