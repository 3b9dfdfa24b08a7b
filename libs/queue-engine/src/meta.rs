use queue_api::{KvOp, KvStore, Offset, StorageError};

use crate::keys;

const META_LEN: usize = 16;

/// Метаданные topic'а. Отсутствие записи = topic не инициализирован.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TopicMeta {
    /// Следующий offset для Insert.
    pub write_offset: Offset,
    /// Следующий offset для GetNext.
    pub read_cursor: Offset,
}

impl TopicMeta {
    pub fn encode(&self) -> [u8; META_LEN] {
        let mut buf = [0u8; META_LEN];
        buf[..8].copy_from_slice(&self.write_offset.to_be_bytes());
        buf[8..].copy_from_slice(&self.read_cursor.to_be_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        let buf: [u8; META_LEN] = bytes.try_into().map_err(|_| {
            StorageError::corruption(format!("topic meta: expected {META_LEN} bytes, got {}", bytes.len()))
        })?;
        let mut write = [0u8; 8];
        let mut read = [0u8; 8];
        write.copy_from_slice(&buf[..8]);
        read.copy_from_slice(&buf[8..]);
        let meta = TopicMeta {
            write_offset: Offset::from_be_bytes(write),
            read_cursor: Offset::from_be_bytes(read),
        };
        if meta.read_cursor > meta.write_offset {
            return Err(StorageError::corruption(format!(
                "topic meta: read cursor {} ahead of write offset {}",
                meta.read_cursor, meta.write_offset
            )));
        }
        Ok(meta)
    }

    /// Ops для записи метаданных в составе batch'а.
    pub fn put_op(&self, topic: &str) -> KvOp {
        KvOp::put(keys::meta(topic), self.encode().to_vec())
    }

    /// Назначить следующий offset записи.
    pub fn take_write_offset(&mut self) -> Result<Offset, StorageError> {
        let offset = self.write_offset;
        self.write_offset = offset
            .checked_add(1)
            .ok_or_else(|| StorageError::corruption("write offset overflow"))?;
        Ok(offset)
    }
}

pub async fn load(kv: &dyn KvStore, topic: &str) -> Result<Option<TopicMeta>, StorageError> {
    match kv.get(&keys::meta(topic)).await? {
        Some(bytes) => TopicMeta::decode(&bytes).map(Some),
        None => Ok(None),
    }
}
