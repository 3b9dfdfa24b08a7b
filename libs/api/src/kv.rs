use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::StorageError;

/// Boxed future returned by every `KvStore` method.
pub type KvFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

// ════════════════════════════════════════════════════════════════
//  Storage Plugin Traits
// ════════════════════════════════════════════════════════════════

/// Фабрика для открытия KvStore по JSON-конфигу.
///
/// Реализации: MemoryStorageFactory, RocksStorageFactory.
/// Сервер выбирает фабрику по имени backend'а из `[storage]`.
pub trait StorageFactory: Send + Sync {
    fn open(&self, config_json: &str) -> Result<Arc<dyn KvStore>, StorageError>;
}

/// Результат удаления ключа. Удаление отсутствующего ключа — не ошибка,
/// но вызывающий может различить оба исхода.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Deleted,
    NotPresent,
}

/// Одна операция атомарного batch'а.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl KvOp {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        KvOp::Put { key: key.into(), value: value.into() }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        KvOp::Delete { key: key.into() }
    }
}

/// Упорядоченное байтовое key-value хранилище под очередью.
///
/// Каждая запись должна быть durable к моменту возврата `Ok`.
/// Корректность доставки опирается только на точечные
/// get/put/delete/has и `write_batch`; `scan_prefix` нужен
/// лишь для инспекции (список topic'ов, in-flight offsets).
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> KvFuture<'_, Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> KvFuture<'_, ()>;

    fn delete(&self, key: &[u8]) -> KvFuture<'_, Removal>;

    fn has(&self, key: &[u8]) -> KvFuture<'_, bool>;

    /// Применить все операции атомарно: после crash видны либо все, либо ни одной.
    fn write_batch(&self, ops: Vec<KvOp>) -> KvFuture<'_, ()>;

    /// Все пары с данным префиксом, в порядке возрастания ключа.
    fn scan_prefix(&self, prefix: &[u8]) -> KvFuture<'_, Vec<(Vec<u8>, Vec<u8>)>>;

    /// Flush буферов на диск.
    fn flush(&self) -> KvFuture<'_, ()>;

    /// Необратимо удалить все данные хранилища. Последующие вызовы
    /// возвращают ошибку с `ErrorKind::Closed`.
    fn destroy(&self) -> KvFuture<'_, ()>;
}
