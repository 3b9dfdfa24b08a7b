//! Раскладка ключей в KV.
//!
//! ```text
//! log:{topic}:{offset BE u64}        -> payload
//! inflight:{topic}:{offset BE u64}   -> payload
//! meta:{topic}                       -> write_offset BE u64 | read_cursor BE u64
//! ```
//!
//! Offset всегда занимает последние 8 байт, поэтому `:` внутри имени
//! topic'а не делает ключ неоднозначным.

use queue_api::Offset;

const LOG_PREFIX: &[u8] = b"log:";
const INFLIGHT_PREFIX: &[u8] = b"inflight:";
const META_PREFIX: &[u8] = b"meta:";

const OFFSET_LEN: usize = std::mem::size_of::<Offset>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Log,
    InFlight,
    Meta,
}

impl Namespace {
    fn prefix(self) -> &'static [u8] {
        match self {
            Namespace::Log => LOG_PREFIX,
            Namespace::InFlight => INFLIGHT_PREFIX,
            Namespace::Meta => META_PREFIX,
        }
    }
}

/// Разобранный ключ. `offset` есть у всех namespace'ов, кроме `Meta`.
#[derive(Debug, PartialEq, Eq)]
pub struct DecodedKey<'a> {
    pub namespace: Namespace,
    pub topic: &'a [u8],
    pub offset: Option<Offset>,
}

pub fn log(topic: &str, offset: Offset) -> Vec<u8> {
    offset_key(Namespace::Log, topic, offset)
}

pub fn inflight(topic: &str, offset: Offset) -> Vec<u8> {
    offset_key(Namespace::InFlight, topic, offset)
}

pub fn meta(topic: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(META_PREFIX.len() + topic.len());
    key.extend_from_slice(META_PREFIX);
    key.extend_from_slice(topic.as_bytes());
    key
}

/// Префикс для scan'а по namespace'у целиком (`topic = None`) или
/// по одному topic'у. Для одного topic'а scan может зацепить topic'и
/// с общим началом имени, так что результат нужно фильтровать через `decode`.
pub fn scan_prefix(namespace: Namespace, topic: Option<&str>) -> Vec<u8> {
    let mut key = namespace.prefix().to_vec();
    if let Some(topic) = topic {
        key.extend_from_slice(topic.as_bytes());
        if namespace != Namespace::Meta {
            key.push(b':');
        }
    }
    key
}

fn offset_key(namespace: Namespace, topic: &str, offset: Offset) -> Vec<u8> {
    let prefix = namespace.prefix();
    let mut key = Vec::with_capacity(prefix.len() + topic.len() + 1 + OFFSET_LEN);
    key.extend_from_slice(prefix);
    key.extend_from_slice(topic.as_bytes());
    key.push(b':');
    key.extend_from_slice(&offset.to_be_bytes());
    key
}

pub fn decode(key: &[u8]) -> Option<DecodedKey<'_>> {
    if let Some(topic) = key.strip_prefix(META_PREFIX) {
        return Some(DecodedKey { namespace: Namespace::Meta, topic, offset: None });
    }

    let (namespace, rest) = if let Some(rest) = key.strip_prefix(LOG_PREFIX) {
        (Namespace::Log, rest)
    } else if let Some(rest) = key.strip_prefix(INFLIGHT_PREFIX) {
        (Namespace::InFlight, rest)
    } else {
        return None;
    };

    if rest.len() < OFFSET_LEN + 1 {
        return None;
    }
    let (head, offset_bytes) = rest.split_at(rest.len() - OFFSET_LEN);
    let topic = head.strip_suffix(b":")?;
    let offset = Offset::from_be_bytes(offset_bytes.try_into().ok()?);
    Some(DecodedKey { namespace, topic, offset: Some(offset) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_round_trip_across_the_range() {
        for offset in [0, 1, 255, 256, u32::MAX as u64 + 1, u64::MAX - 1, u64::MAX] {
            let key = inflight("orders", offset);
            let decoded = decode(&key).unwrap();
            assert_eq!(decoded.namespace, Namespace::InFlight);
            assert_eq!(decoded.topic, b"orders");
            assert_eq!(decoded.offset, Some(offset));
        }
    }

    #[test]
    fn namespaces_never_collide() {
        assert_ne!(log("t", 0), inflight("t", 0));
        assert_ne!(meta("t"), log("t", 0));
        // topic "inflight" in the log namespace is still a log key
        assert_eq!(decode(&log("inflight", 3)).unwrap().namespace, Namespace::Log);
    }

    #[test]
    fn colon_in_topic_name_is_unambiguous() {
        let key = log("a:b", 7);
        let decoded = decode(&key).unwrap();
        assert_eq!(decoded.topic, b"a:b");
        assert_eq!(decoded.offset, Some(7));
        assert_ne!(log("a:b", 7), log("a", 7));
    }

    #[test]
    fn log_keys_sort_by_offset() {
        assert!(log("t", 9) < log("t", 10));
        assert!(log("t", 255) < log("t", 256));
    }

    #[test]
    fn foreign_and_truncated_keys_are_rejected() {
        assert_eq!(decode(b"other:t"), None);
        assert_eq!(decode(b"log:t:123"), None);
        assert_eq!(decode(&meta("t")).unwrap().topic, b"t");
    }

    #[test]
    fn topic_scan_prefix_ends_with_separator() {
        assert_eq!(scan_prefix(Namespace::InFlight, Some("t")), b"inflight:t:".to_vec());
        assert_eq!(scan_prefix(Namespace::Meta, None), b"meta:".to_vec());
    }
}
