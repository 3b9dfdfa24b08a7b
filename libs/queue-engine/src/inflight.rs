//! In-Flight Table: `(topic, offset) -> payload` для выданных, но ещё не
//! подтверждённых сообщений. Наличие ключа — единственный признак in-flight.

use queue_api::{KvOp, KvStore, Offset, Removal, StorageError};

use crate::keys::{self, Namespace};

pub fn insert_op(topic: &str, offset: Offset, payload: &[u8]) -> KvOp {
    KvOp::put(keys::inflight(topic, offset), payload)
}

pub fn remove_op(topic: &str, offset: Offset) -> KvOp {
    KvOp::delete(keys::inflight(topic, offset))
}

pub async fn get(kv: &dyn KvStore, topic: &str, offset: Offset) -> Result<Option<Vec<u8>>, StorageError> {
    kv.get(&keys::inflight(topic, offset)).await
}

pub async fn contains(kv: &dyn KvStore, topic: &str, offset: Offset) -> Result<bool, StorageError> {
    kv.has(&keys::inflight(topic, offset)).await
}

pub async fn remove(kv: &dyn KvStore, topic: &str, offset: Offset) -> Result<Removal, StorageError> {
    kv.delete(&keys::inflight(topic, offset)).await
}

/// Offsets topic'а, находящиеся in-flight, по возрастанию.
pub async fn offsets(kv: &dyn KvStore, topic: &str) -> Result<Vec<Offset>, StorageError> {
    let prefix = keys::scan_prefix(Namespace::InFlight, Some(topic));
    let mut out = Vec::new();
    for (key, _) in kv.scan_prefix(&prefix).await? {
        let decoded = keys::decode(&key)
            .ok_or_else(|| StorageError::corruption("malformed in-flight key"))?;
        // prefix "inflight:a:" также покрывает topic "a:b"
        if decoded.topic != topic.as_bytes() {
            continue;
        }
        if let Some(offset) = decoded.offset {
            out.push(offset);
        }
    }
    Ok(out)
}
