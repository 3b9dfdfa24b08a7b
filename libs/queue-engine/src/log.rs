//! Message Log: `(topic, offset) -> payload`. Записи неизменяемы и не
//! удаляются после выдачи.

use queue_api::{KvOp, KvStore, Offset, StorageError};

use crate::keys;

pub fn append_op(topic: &str, offset: Offset, payload: &[u8]) -> KvOp {
    KvOp::put(keys::log(topic, offset), payload)
}

/// Прочитать запись, которая обязана существовать (offset < write_offset).
pub async fn read(kv: &dyn KvStore, topic: &str, offset: Offset) -> Result<Vec<u8>, StorageError> {
    kv.get(&keys::log(topic, offset)).await?.ok_or_else(|| {
        StorageError::corruption(format!("topic '{topic}': log record {offset} is missing"))
    })
}
