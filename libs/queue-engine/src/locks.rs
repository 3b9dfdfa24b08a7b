use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Мьютекс на каждый topic.
///
/// Все операции над одним topic'ом выполняются под его мьютексом, так что
/// read-modify-write метаданных не гоняется. Разные topic'и делят только
/// короткую блокировку карты.
#[derive(Default)]
pub struct TopicLocks {
    map: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TopicLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, topic: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.map.lock().await;
            // Слоты, которые никто не держит и не ждёт, больше не нужны.
            if map.len() > 1024 {
                map.retain(|_, slot| Arc::strong_count(slot) > 1);
            }
            map.entry(topic.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_topic_is_exclusive() {
        let locks = Arc::new(TopicLocks::new());
        let guard = locks.lock("t").await;

        let l = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = l.lock("t").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn distinct_topics_do_not_block() {
        let locks = TopicLocks::new();
        let _a = locks.lock("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("b")).await;
        assert!(b.is_ok());
    }
}
