//! Bounded in-process LRU tier in front of the disk records.

use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use lru::LruCache;
use tracing::debug;

use super::{CacheKey, CachedResponse};

/// Default number of entries held in memory.
pub const DEFAULT_MAX_MEM_CACHE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: CachedResponse,
    expires_at: DateTime<Utc>,
}

/// Recency-ordered map of cached responses with a hard capacity.
///
/// Not synchronized; [`LlmCache`](super::LlmCache) keeps it behind a mutex.
pub struct MemoryTier {
    entries: LruCache<CacheKey, MemoryEntry>,
}

impl MemoryTier {
    /// Create a tier holding at most `capacity` entries.
    ///
    /// `capacity` is clamped to a minimum of 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Return the value for `key` if present and `now < expires_at`.
    ///
    /// A hit becomes the most recently used entry. An expired entry is dropped.
    pub fn get(&mut self, key: &CacheKey) -> Option<CachedResponse> {
        self.get_at(key, Utc::now())
    }

    pub(crate) fn get_at(&mut self, key: &CacheKey, now: DateTime<Utc>) -> Option<CachedResponse> {
        let expired = match self.entries.peek(key) {
            Some(entry) => now >= entry.expires_at,
            None => return None,
        };
        if expired {
            debug!(key = %key.short(), "Memory cache entry expired, removing");
            self.entries.pop(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or refresh `key` at the most recently used position.
    ///
    /// Returns the key that was evicted to make room, if any.
    pub fn put(
        &mut self,
        key: CacheKey,
        value: CachedResponse,
        expires_at: DateTime<Utc>,
    ) -> Option<CacheKey> {
        // Re-insertion counts as fresh use and must never evict another key.
        self.entries.pop(&key);
        let evicted = self
            .entries
            .push(key, MemoryEntry { value, expires_at })
            .map(|(evicted_key, _)| evicted_key);
        if let Some(evicted_key) = &evicted {
            debug!(key = %evicted_key.short(), "LRU eviction");
        }
        evicted
    }

    pub fn remove(&mut self, key: &CacheKey) -> bool {
        self.entries.pop(key).is_some()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEM_CACHE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::json;

    fn key(name: &str) -> CacheKey {
        CacheKey::derive("m", "v", &json!({ "name": name })).unwrap()
    }

    fn response(text: &str) -> CachedResponse {
        let mut map = CachedResponse::new();
        map.insert("text".into(), json!(text));
        map
    }

    fn later() -> DateTime<Utc> {
        Utc::now() + TimeDelta::hours(1)
    }

    #[test]
    fn test_memory_hit_and_miss() {
        let mut tier = MemoryTier::new(4);
        assert!(tier.get(&key("a")).is_none());
        tier.put(key("a"), response("A"), later());
        assert_eq!(tier.get(&key("a")), Some(response("A")));
    }

    #[test]
    fn test_memory_expired_entry_removed() {
        let mut tier = MemoryTier::new(4);
        let expires = Utc::now();
        tier.put(key("a"), response("A"), expires);
        assert!(tier.get_at(&key("a"), expires).is_none(), "now == expires_at is a miss");
        assert!(!tier.contains(&key("a")));
        assert!(tier.is_empty());
    }

    #[test]
    fn test_memory_evicts_least_recently_inserted() {
        let mut tier = MemoryTier::new(3);
        tier.put(key("a"), response("A"), later());
        tier.put(key("b"), response("B"), later());
        tier.put(key("c"), response("C"), later());
        let evicted = tier.put(key("d"), response("D"), later());
        assert_eq!(evicted, Some(key("a")));
        assert_eq!(tier.len(), 3);
        assert!(!tier.contains(&key("a")));
    }

    #[test]
    fn test_memory_get_refreshes_recency() {
        let mut tier = MemoryTier::new(3);
        tier.put(key("a"), response("A"), later());
        tier.put(key("b"), response("B"), later());
        tier.put(key("c"), response("C"), later());
        assert!(tier.get(&key("a")).is_some());
        let evicted = tier.put(key("d"), response("D"), later());
        assert_eq!(evicted, Some(key("b")), "a was touched, b is now the LRU entry");
        assert!(tier.contains(&key("a")));
    }

    #[test]
    fn test_memory_reinsert_does_not_evict() {
        let mut tier = MemoryTier::new(2);
        tier.put(key("a"), response("A"), later());
        tier.put(key("b"), response("B"), later());
        assert_eq!(tier.put(key("a"), response("A2"), later()), None);
        assert_eq!(tier.len(), 2);
        assert_eq!(tier.get(&key("a")), Some(response("A2")));
        // a was re-inserted last, so b goes first.
        assert_eq!(tier.put(key("c"), response("C"), later()), Some(key("b")));
    }

    #[test]
    fn test_memory_zero_capacity_clamped() {
        let mut tier = MemoryTier::new(0);
        assert_eq!(tier.capacity(), 1);
        tier.put(key("a"), response("A"), later());
        tier.put(key("b"), response("B"), later());
        assert_eq!(tier.len(), 1);
        assert!(tier.contains(&key("b")));
    }

    #[test]
    fn test_memory_remove_and_clear() {
        let mut tier = MemoryTier::default();
        assert_eq!(tier.capacity(), DEFAULT_MAX_MEM_CACHE_SIZE);
        tier.put(key("a"), response("A"), later());
        tier.put(key("b"), response("B"), later());
        assert!(tier.remove(&key("a")));
        assert!(!tier.remove(&key("a")));
        tier.clear();
        assert!(tier.is_empty());
    }
}
