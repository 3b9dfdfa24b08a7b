pub mod error;
pub mod inflight;
pub mod keys;
pub mod locks;
pub mod log;
pub mod meta;

use std::sync::Arc;

use queue_api::{Delivery, KvOp, KvStore, Offset, Removal, StorageError, TopicStats};

pub use error::QueueError;
pub use locks::TopicLocks;
pub use meta::TopicMeta;

// ═══════════════════════════════════════════════════════════════
//  Store
// ═══════════════════════════════════════════════════════════════

/// Очередь с topic'ами поверх KvStore.
///
/// Producer'ы добавляют payload'ы через `insert`, consumer забирает их по
/// одному через `get_next` и обязан завершить каждую выдачу одним из
/// `ack` / `nack` / `back`. Таймаута выдачи нет: сообщение, которое
/// никто не подтвердил, остаётся in-flight навсегда.
///
/// На каждый topic один курсор чтения, то есть рассчитано на одного
/// consumer'а, обрабатывающего сообщения строго по порядку.
pub struct Store {
    kv: Arc<dyn KvStore>,
    locks: TopicLocks,
}

impl Store {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            locks: TopicLocks::new(),
        }
    }

    /// Нижележащее хранилище.
    pub fn storage(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    /// Добавить payload в конец topic'а. Первый Insert создаёт topic.
    /// Возвращает назначенный offset.
    pub async fn insert(&self, topic: &str, payload: &[u8]) -> Result<Offset, QueueError> {
        let _guard = self.locks.lock(topic).await;

        let mut meta = meta::load(&*self.kv, topic).await?.unwrap_or_default();
        let (offset, mut ops) = append_ops(&mut meta, topic, payload)?;
        ops.push(meta.put_op(topic));
        self.kv.write_batch(ops).await?;

        tracing::debug!(topic, offset, len = payload.len(), "inserted");
        Ok(offset)
    }

    /// Выдать следующее сообщение и пометить его in-flight.
    pub async fn get_next(&self, topic: &str) -> Result<Delivery, QueueError> {
        let _guard = self.locks.lock(topic).await;

        let mut meta = meta::load(&*self.kv, topic)
            .await?
            .ok_or(QueueError::TopicNotExist)?;
        let offset = meta.read_cursor;
        if offset >= meta.write_offset {
            return Err(QueueError::NoMessageAvailable);
        }

        let payload = log::read(&*self.kv, topic, offset).await?;
        meta.read_cursor = offset + 1;
        self.kv
            .write_batch(vec![inflight::insert_op(topic, offset, &payload), meta.put_op(topic)])
            .await?;

        tracing::debug!(topic, offset, "delivered");
        Ok(Delivery { offset, payload })
    }

    /// Окончательно подтвердить offset. Повторный Ack или Ack offset'а,
    /// который не in-flight, молча успешен.
    pub async fn ack(&self, topic: &str, offset: Offset) -> Result<(), QueueError> {
        let _guard = self.locks.lock(topic).await;

        match inflight::remove(&*self.kv, topic, offset).await? {
            Removal::Deleted => tracing::debug!(topic, offset, "acked"),
            Removal::NotPresent => {
                tracing::debug!(topic, offset, "ack of offset not in flight")
            }
        }
        Ok(())
    }

    /// Вернуть сообщение на немедленную повторную выдачу: курсор чтения
    /// откатывается на `offset`.
    ///
    /// Курсор один на topic, поэтому Nack не последнего выданного offset'а
    /// заново выдаст и все offset'ы между ним и текущим курсором, даже если
    /// они уже подтверждены или всё ещё in-flight.
    pub async fn nack(&self, topic: &str, offset: Offset) -> Result<(), QueueError> {
        let _guard = self.locks.lock(topic).await;

        if !inflight::contains(&*self.kv, topic, offset).await? {
            return Err(QueueError::NackMsgNotExist);
        }

        let mut meta = meta::load(&*self.kv, topic).await?.ok_or_else(|| {
            StorageError::corruption(format!("topic '{topic}': in-flight offset {offset} without metadata"))
        })?;
        if offset >= meta.write_offset {
            return Err(StorageError::corruption(format!(
                "topic '{topic}': in-flight offset {offset} beyond write offset {}",
                meta.write_offset
            ))
            .into());
        }

        if meta.read_cursor > offset + 1 {
            tracing::warn!(
                topic,
                offset,
                read_cursor = meta.read_cursor,
                "nack rewinds cursor over later deliveries, they will be delivered again"
            );
        }
        meta.read_cursor = offset;
        self.kv
            .write_batch(vec![inflight::remove_op(topic, offset), meta.put_op(topic)])
            .await?;

        tracing::debug!(topic, offset, "nacked");
        Ok(())
    }

    /// Отправить сообщение в конец очереди под новым offset'ом.
    /// Курсор чтения не меняется. Возвращает новый offset или `None`,
    /// если offset не был in-flight.
    pub async fn back(&self, topic: &str, offset: Offset) -> Result<Option<Offset>, QueueError> {
        let _guard = self.locks.lock(topic).await;

        let Some(payload) = inflight::get(&*self.kv, topic, offset).await? else {
            tracing::debug!(topic, offset, "back of offset not in flight");
            return Ok(None);
        };

        let mut meta = meta::load(&*self.kv, topic).await?.unwrap_or_default();
        let (requeued, mut ops) = append_ops(&mut meta, topic, &payload)?;
        ops.push(inflight::remove_op(topic, offset));
        ops.push(meta.put_op(topic));
        self.kv.write_batch(ops).await?;

        tracing::debug!(topic, offset, requeued, "sent back");
        Ok(Some(requeued))
    }

    /// Состояние topic'а.
    pub async fn stats(&self, topic: &str) -> Result<TopicStats, QueueError> {
        let _guard = self.locks.lock(topic).await;

        let meta = meta::load(&*self.kv, topic)
            .await?
            .ok_or(QueueError::TopicNotExist)?;
        let in_flight = inflight::offsets(&*self.kv, topic).await?.len();
        Ok(TopicStats {
            topic: topic.to_string(),
            write_offset: meta.write_offset,
            read_cursor: meta.read_cursor,
            in_flight,
        })
    }

    /// Имена инициализированных topic'ов, по возрастанию.
    pub async fn topics(&self) -> Result<Vec<String>, QueueError> {
        let prefix = keys::scan_prefix(keys::Namespace::Meta, None);
        let mut names = Vec::new();
        for (key, _) in self.kv.scan_prefix(&prefix).await? {
            let decoded = keys::decode(&key)
                .ok_or_else(|| StorageError::corruption("malformed meta key"))?;
            let name = String::from_utf8(decoded.topic.to_vec())
                .map_err(|e| StorageError::corruption(format!("topic name: {e}")))?;
            names.push(name);
        }
        Ok(names)
    }

    /// Offsets topic'а, которые сейчас in-flight.
    pub async fn in_flight(&self, topic: &str) -> Result<Vec<Offset>, QueueError> {
        let _guard = self.locks.lock(topic).await;
        Ok(inflight::offsets(&*self.kv, topic).await?)
    }

    pub async fn flush(&self) -> Result<(), QueueError> {
        Ok(self.kv.flush().await?)
    }

    /// Необратимо удалить все данные очереди.
    pub async fn destroy(&self) -> Result<(), QueueError> {
        self.kv.destroy().await?;
        tracing::info!("store destroyed");
        Ok(())
    }
}

/// Назначить offset в конце log'а и вернуть ops записи payload'а.
/// Метаданные обновляются в `meta`, их запись остаётся за вызывающим.
fn append_ops(meta: &mut TopicMeta, topic: &str, payload: &[u8]) -> Result<(Offset, Vec<KvOp>), StorageError> {
    let offset = meta.take_write_offset()?;
    Ok((offset, vec![log::append_op(topic, offset, payload)]))
}
