//! Bounded cache of skipped message keys.
//!
//! Keys are derived ahead of time when a header's counter jumps forward, so
//! the messages in the gap can still be decrypted when they arrive. The
//! cache is bounded; once full the oldest entry is evicted first.
//!
//! # Serialized form
//!
//! A map from `base64(dh || counter_be32)` to the 32 raw key bytes, written in
//! insertion order so eviction order survives a reload.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
};

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, MapAccess, Visitor},
    ser::SerializeMap,
};
use zeroize::Zeroize;

use crate::keys::DH_KEY_SIZE;

/// Cache index: sender's ratchet public key and message counter
pub type SkippedKeyId = ([u8; DH_KEY_SIZE], u32);

const ENCODED_ID_SIZE: usize = DH_KEY_SIZE + 4;

/// Skipped message keys in insertion (FIFO) order.
///
/// # Invariants
///
/// - `order` holds exactly the ids present in `keys`, oldest first
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SkippedKeys {
    keys: HashMap<SkippedKeyId, [u8; 32]>,
    order: VecDeque<SkippedKeyId>,
}

impl SkippedKeys {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no keys are cached.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns true if a key for `id` is cached.
    pub fn contains(&self, id: &SkippedKeyId) -> bool {
        self.keys.contains_key(id)
    }

    /// Remove and return the key for `id`.
    pub(crate) fn take(&mut self, id: &SkippedKeyId) -> Option<[u8; 32]> {
        let key = self.keys.remove(id)?;
        self.order.retain(|queued| queued != id);
        Some(key)
    }

    /// Cache `key` under `id`, evicting the oldest entries beyond `capacity`.
    ///
    /// Returns the number of entries evicted.
    pub(crate) fn insert(&mut self, id: SkippedKeyId, key: [u8; 32], capacity: usize) -> usize {
        if capacity == 0 {
            return 0;
        }

        if let Some(mut previous) = self.keys.insert(id, key) {
            previous.zeroize();
            return 0;
        }
        self.order.push_back(id);

        let mut evicted = 0;
        while self.keys.len() > capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(mut stale) = self.keys.remove(&oldest) {
                stale.zeroize();
                evicted += 1;
            }
        }

        debug_assert_eq!(self.keys.len(), self.order.len());
        evicted
    }

    fn encode_id((dh, counter): &SkippedKeyId) -> String {
        let mut raw = [0u8; ENCODED_ID_SIZE];
        raw[..DH_KEY_SIZE].copy_from_slice(dh);
        raw[DH_KEY_SIZE..].copy_from_slice(&counter.to_be_bytes());
        STANDARD.encode(raw)
    }

    fn decode_id(encoded: &str) -> Option<SkippedKeyId> {
        let raw = STANDARD.decode(encoded).ok()?;
        if raw.len() != ENCODED_ID_SIZE {
            return None;
        }

        let mut dh = [0u8; DH_KEY_SIZE];
        dh.copy_from_slice(&raw[..DH_KEY_SIZE]);
        let mut counter = [0u8; 4];
        counter.copy_from_slice(&raw[DH_KEY_SIZE..]);
        Some((dh, u32::from_be_bytes(counter)))
    }
}

impl Drop for SkippedKeys {
    fn drop(&mut self) {
        for key in self.keys.values_mut() {
            key.zeroize();
        }
    }
}

impl fmt::Debug for SkippedKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkippedKeys").field("len", &self.keys.len()).finish_non_exhaustive()
    }
}

impl Serialize for SkippedKeys {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for id in &self.order {
            if let Some(key) = self.keys.get(id) {
                map.serialize_entry(&Self::encode_id(id), key)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SkippedKeys {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SkippedKeysVisitor)
    }
}

struct SkippedKeysVisitor;

impl<'de> Visitor<'de> for SkippedKeysVisitor {
    type Value = SkippedKeys;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map from base64(dh || counter) to 32-byte message keys")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut skipped = SkippedKeys::new();

        while let Some((encoded, key)) = access.next_entry::<String, [u8; 32]>()? {
            let id = SkippedKeys::decode_id(&encoded).ok_or_else(|| {
                de::Error::invalid_value(de::Unexpected::Str(&encoded), &"base64 of 36 bytes")
            })?;
            if skipped.keys.insert(id, key).is_some() {
                return Err(de::Error::custom("duplicate skipped key entry"));
            }
            skipped.order.push_back(id);
        }

        Ok(skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(tag: u8, counter: u32) -> SkippedKeyId {
        ([tag; DH_KEY_SIZE], counter)
    }

    #[test]
    fn take_removes_entry() {
        let mut cache = SkippedKeys::new();
        cache.insert(id(1, 0), [9; 32], 10);

        assert_eq!(cache.take(&id(1, 0)), Some([9; 32]));
        assert_eq!(cache.take(&id(1, 0)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn eviction_is_oldest_first() {
        let mut cache = SkippedKeys::new();
        for counter in 0..3 {
            assert_eq!(cache.insert(id(1, counter), [counter as u8; 32], 3), 0);
        }

        assert_eq!(cache.insert(id(2, 0), [7; 32], 3), 1);
        assert!(!cache.contains(&id(1, 0)));
        assert!(cache.contains(&id(1, 1)));
        assert!(cache.contains(&id(2, 0)));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn taken_entries_do_not_count_toward_eviction() {
        let mut cache = SkippedKeys::new();
        cache.insert(id(1, 0), [0; 32], 2);
        cache.insert(id(1, 1), [1; 32], 2);
        cache.take(&id(1, 0));

        assert_eq!(cache.insert(id(1, 2), [2; 32], 2), 0);
        assert!(cache.contains(&id(1, 1)));
    }

    #[test]
    fn zero_capacity_caches_nothing() {
        let mut cache = SkippedKeys::new();
        cache.insert(id(1, 0), [0; 32], 0);

        assert!(cache.is_empty());
    }

    #[test]
    fn json_keys_are_base64_of_dh_and_counter() {
        let mut cache = SkippedKeys::new();
        cache.insert(id(0, 1), [5; 32], 10);

        let json = serde_json::to_value(&cache).unwrap();
        let object = json.as_object().unwrap();

        let mut raw = vec![0u8; DH_KEY_SIZE];
        raw.extend_from_slice(&[0, 0, 0, 1]);
        assert!(object.contains_key(&STANDARD.encode(&raw)));
    }

    #[test]
    fn serialization_preserves_eviction_order() {
        let mut cache = SkippedKeys::new();
        cache.insert(id(3, 9), [1; 32], 10);
        cache.insert(id(1, 0), [2; 32], 10);
        cache.insert(id(2, 4), [3; 32], 10);

        let json = serde_json::to_string(&cache).unwrap();
        let mut restored: SkippedKeys = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cache);

        restored.insert(id(4, 0), [4; 32], 3);
        assert!(!restored.contains(&id(3, 9)));
    }

    #[test]
    fn malformed_id_is_rejected() {
        let json = format!(r#"{{"AAAA": {:?}}}"#, [0u8; 32]);
        assert!(serde_json::from_str::<SkippedKeys>(&json).is_err());
    }
}
