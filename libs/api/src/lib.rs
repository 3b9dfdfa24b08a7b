pub mod error;
pub mod kv;

use base64::Engine;
use serde::{Deserialize, Serialize};

pub use error::{ErrorKind, StorageError};
pub use kv::{KvFuture, KvOp, KvStore, Removal, StorageFactory};

/// Позиция сообщения в log'е topic'а. Начинается с 0, растёт без пропусков.
pub type Offset = u64;

// ════════════════════════════════════════════════════════════════
//  Delivery
// ════════════════════════════════════════════════════════════════

/// Сообщение, выданное consumer'у через GetNext.
///
/// Payload непрозрачен для очереди. В JSON передаётся как base64,
/// поскольку байты могут быть произвольными.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub offset: Offset,
    pub payload: Vec<u8>,
}

impl Serialize for Delivery {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Delivery", 2)?;
        s.serialize_field("offset", &self.offset)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.payload);
        s.serialize_field("payload", &encoded)?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for Delivery {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Wire {
            offset: Offset,
            payload: String,
        }
        let wire = Wire::deserialize(deserializer)?;
        let payload = base64::engine::general_purpose::STANDARD
            .decode(wire.payload)
            .map_err(serde::de::Error::custom)?;
        Ok(Delivery { offset: wire.offset, payload })
    }
}

// ════════════════════════════════════════════════════════════════
//  Topic Stats
// ════════════════════════════════════════════════════════════════

/// Снимок состояния topic'а для инспекции.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStats {
    pub topic: String,
    /// Следующий offset, который назначит Insert.
    pub write_offset: Offset,
    /// Следующий offset, который выдаст GetNext.
    pub read_cursor: Offset,
    /// Количество выданных, но не подтверждённых сообщений.
    pub in_flight: usize,
}

impl TopicStats {
    /// Сообщений, ожидающих выдачи.
    pub fn pending(&self) -> u64 {
        self.write_offset.saturating_sub(self.read_cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_payload_travels_as_base64() {
        let d = Delivery { offset: 7, payload: vec![0, 159, 146, 150] };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["offset"], 7);
        assert_eq!(json["payload"], "AJ+Slg==");

        let back: Delivery = serde_json::from_value(json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn delivery_rejects_non_base64_payload() {
        let err = serde_json::from_str::<Delivery>(r#"{"offset":1,"payload":"%%%"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn pending_never_underflows() {
        let stats = TopicStats {
            topic: "t".into(),
            write_offset: 3,
            read_cursor: 1,
            in_flight: 1,
        };
        assert_eq!(stats.pending(), 2);

        let drained = TopicStats { read_cursor: 3, ..stats };
        assert_eq!(drained.pending(), 0);
    }
}
