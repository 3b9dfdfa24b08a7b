mod config;
mod storage;

use std::sync::Arc;

use queue_api::{KvStore, StorageError, StorageFactory};

pub use config::RocksStorageConfig;
pub use storage::RocksStorage;

// ════════════════════════════════════════════════════════════════
//  RocksStorageFactory
// ════════════════════════════════════════════════════════════════

pub struct RocksStorageFactory;

impl StorageFactory for RocksStorageFactory {
    fn open(&self, config_json: &str) -> Result<Arc<dyn KvStore>, StorageError> {
        let cfg: RocksStorageConfig = serde_json::from_str(config_json)?;
        let storage = RocksStorage::open(&cfg.path, cfg.sync_writes)?;
        Ok(Arc::new(storage))
    }
}
