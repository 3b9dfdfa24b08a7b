pub mod destroy;
pub mod serve;

use std::sync::Arc;

use queue_api::StorageFactory;
use queue_engine::Store;
use storage_memory::MemoryStorageFactory;
use storage_rocksdb::RocksStorageFactory;

use crate::config::StorageConfig;
use crate::error::ServerError;

fn storage_factory(backend: &str) -> Result<&'static dyn StorageFactory, ServerError> {
    match backend {
        "rocksdb" => Ok(&RocksStorageFactory),
        "memory" => Ok(&MemoryStorageFactory),
        other => Err(ServerError::UnknownBackend(other.to_string())),
    }
}

/// Открыть хранилище из `[storage]` и обернуть его в очередь.
pub(crate) fn open_store(cfg: &StorageConfig) -> Result<Arc<Store>, ServerError> {
    let factory = storage_factory(&cfg.backend)?;
    let kv = factory.open(&cfg.options_json()?)?;
    tracing::info!(backend = %cfg.backend, "opened storage");
    Ok(Arc::new(Store::new(kv)))
}
