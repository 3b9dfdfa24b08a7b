use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use queue_api::{KvFuture, KvOp, KvStore, Removal, StorageError, StorageFactory};

// ═══════════════════════════════════════════════════════════════
//  MemoryStorageConfig
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, serde::Deserialize)]
pub struct MemoryStorageConfig {
    /// Ограничение на число ключей; `None` — без ограничения.
    #[serde(default)]
    pub max_keys: Option<usize>,
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStorage
// ═══════════════════════════════════════════════════════════════

/// In-memory упорядоченное хранилище. Для тестов и topic'ов, не требующих
/// дисковой persistence. `None` после `destroy()`.
pub struct MemoryStorage {
    entries: RwLock<Option<BTreeMap<Vec<u8>, Vec<u8>>>>,
    max_keys: Option<usize>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MemoryStorage {
    pub fn new(max_keys: Option<usize>) -> Self {
        Self {
            entries: RwLock::new(Some(BTreeMap::new())),
            max_keys,
        }
    }

    fn check_capacity(&self, map: &BTreeMap<Vec<u8>, Vec<u8>>, key: &[u8]) -> Result<(), StorageError> {
        match self.max_keys {
            Some(max) if map.len() >= max && !map.contains_key(key) => {
                Err(StorageError::io(format!("memory storage full ({max} keys)")))
            }
            _ => Ok(()),
        }
    }
}

impl KvStore for MemoryStorage {
    fn get(&self, key: &[u8]) -> KvFuture<'_, Option<Vec<u8>>> {
        let key = key.to_vec();
        Box::pin(async move {
            let guard = self.entries.read().await;
            let map = guard.as_ref().ok_or_else(StorageError::closed)?;
            Ok(map.get(&key).cloned())
        })
    }

    fn put(&self, key: &[u8], value: &[u8]) -> KvFuture<'_, ()> {
        let key = key.to_vec();
        let value = value.to_vec();
        Box::pin(async move {
            let mut guard = self.entries.write().await;
            let map = guard.as_mut().ok_or_else(StorageError::closed)?;
            self.check_capacity(map, &key)?;
            map.insert(key, value);
            Ok(())
        })
    }

    fn delete(&self, key: &[u8]) -> KvFuture<'_, Removal> {
        let key = key.to_vec();
        Box::pin(async move {
            let mut guard = self.entries.write().await;
            let map = guard.as_mut().ok_or_else(StorageError::closed)?;
            Ok(match map.remove(&key) {
                Some(_) => Removal::Deleted,
                None => Removal::NotPresent,
            })
        })
    }

    fn has(&self, key: &[u8]) -> KvFuture<'_, bool> {
        let key = key.to_vec();
        Box::pin(async move {
            let guard = self.entries.read().await;
            let map = guard.as_ref().ok_or_else(StorageError::closed)?;
            Ok(map.contains_key(&key))
        })
    }

    fn write_batch(&self, ops: Vec<KvOp>) -> KvFuture<'_, ()> {
        Box::pin(async move {
            let mut guard = self.entries.write().await;
            let map = guard.as_mut().ok_or_else(StorageError::closed)?;

            // Проверяем всё до первой мутации, чтобы batch не применился наполовину.
            if let Some(max) = self.max_keys {
                if batch_len(map, &ops) > max {
                    return Err(StorageError::io(format!("memory storage full ({max} keys)")));
                }
            }

            for op in ops {
                match op {
                    KvOp::Put { key, value } => {
                        map.insert(key, value);
                    }
                    KvOp::Delete { key } => {
                        map.remove(&key);
                    }
                }
            }
            Ok(())
        })
    }

    fn scan_prefix(&self, prefix: &[u8]) -> KvFuture<'_, Vec<(Vec<u8>, Vec<u8>)>> {
        let prefix = prefix.to_vec();
        Box::pin(async move {
            let guard = self.entries.read().await;
            let map = guard.as_ref().ok_or_else(StorageError::closed)?;
            Ok(map
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect())
        })
    }

    fn flush(&self) -> KvFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn destroy(&self) -> KvFuture<'_, ()> {
        Box::pin(async move {
            self.entries.write().await.take();
            Ok(())
        })
    }
}

/// Число ключей после применения batch'а: учитывает и Delete,
/// и повторные операции над одним ключом (побеждает последняя).
fn batch_len(map: &BTreeMap<Vec<u8>, Vec<u8>>, ops: &[KvOp]) -> usize {
    let mut touched: BTreeMap<&[u8], bool> = BTreeMap::new();
    for op in ops {
        match op {
            KvOp::Put { key, .. } => touched.insert(key.as_slice(), true),
            KvOp::Delete { key } => touched.insert(key.as_slice(), false),
        };
    }
    let existing = touched.keys().filter(|k| map.contains_key(**k)).count();
    let present = touched.values().filter(|present| **present).count();
    map.len() - existing + present
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStorageFactory
// ═══════════════════════════════════════════════════════════════

pub struct MemoryStorageFactory;

impl StorageFactory for MemoryStorageFactory {
    fn open(&self, config_json: &str) -> Result<Arc<dyn KvStore>, StorageError> {
        let config: MemoryStorageConfig = serde_json::from_str(config_json)?;
        Ok(Arc::new(MemoryStorage::new(config.max_keys)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queue_api::ErrorKind;

    #[tokio::test]
    async fn delete_reports_whether_key_existed() {
        let s = MemoryStorage::default();
        s.put(b"k", b"v").await.unwrap();

        assert_eq!(s.delete(b"k").await.unwrap(), Removal::Deleted);
        assert_eq!(s.delete(b"k").await.unwrap(), Removal::NotPresent);
        assert!(!s.has(b"k").await.unwrap());
    }

    #[tokio::test]
    async fn scan_stops_at_prefix_boundary() {
        let s = MemoryStorage::default();
        s.put(b"a:1", b"1").await.unwrap();
        s.put(b"a:2", b"2").await.unwrap();
        s.put(b"b:1", b"3").await.unwrap();
        s.put(b"a", b"0").await.unwrap();

        let keys: Vec<Vec<u8>> = s.scan_prefix(b"a:").await.unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a:1".to_vec(), b"a:2".to_vec()]);
    }

    #[tokio::test]
    async fn full_batch_leaves_store_untouched() {
        let s = MemoryStorage::new(Some(2));
        s.put(b"x", b"1").await.unwrap();

        let err = s
            .write_batch(vec![KvOp::put(b"y".to_vec(), b"2".to_vec()), KvOp::put(b"z".to_vec(), b"3".to_vec())])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!s.has(b"y").await.unwrap());

        // overwriting an existing key does not count against the limit
        s.write_batch(vec![KvOp::put(b"x".to_vec(), b"9".to_vec()), KvOp::delete(b"x".to_vec())])
            .await
            .unwrap();
        assert_eq!(s.get(b"x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn batch_deletes_free_room_for_its_puts() {
        let s = MemoryStorage::new(Some(3));
        s.put(b"log:0", b"a").await.unwrap();
        s.put(b"inflight:0", b"a").await.unwrap();
        s.put(b"meta", b"m0").await.unwrap();

        // requeue at full capacity: one new key, one overwrite, one delete
        s.write_batch(vec![
            KvOp::put(b"log:1".to_vec(), b"a".to_vec()),
            KvOp::delete(b"inflight:0".to_vec()),
            KvOp::put(b"meta".to_vec(), b"m1".to_vec()),
        ])
        .await
        .unwrap();
        assert!(s.has(b"log:1").await.unwrap());
        assert!(!s.has(b"inflight:0").await.unwrap());

        // deleting and re-putting a key frees nothing for other puts
        let err = s
            .write_batch(vec![
                KvOp::delete(b"log:0".to_vec()),
                KvOp::put(b"log:0".to_vec(), b"b".to_vec()),
                KvOp::put(b"log:2".to_vec(), b"c".to_vec()),
            ])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(s.get(b"log:0").await.unwrap(), Some(b"a".to_vec()));
    }

    #[tokio::test]
    async fn destroyed_store_rejects_calls() {
        let s = MemoryStorage::default();
        s.put(b"k", b"v").await.unwrap();
        s.destroy().await.unwrap();

        let err = s.get(b"k").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Closed);
    }

    #[test]
    fn factory_accepts_empty_and_explicit_config() {
        assert!(MemoryStorageFactory.open("{}").is_ok());
        assert!(MemoryStorageFactory.open(r#"{"max_keys": 10}"#).is_ok());
        assert!(MemoryStorageFactory.open(r#"{"max_keys": "ten"}"#).is_err());
    }
}
