/// Time-bounded cache with an explicit hit/miss signal
///
/// Entries carry their insertion time. A lookup older than the TTL is a miss;
/// expired entries stay until the next sweep.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Result of a cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<V> {
    Hit(V),
    Miss,
}

impl<V> CacheLookup<V> {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    pub fn into_option(self) -> Option<V> {
        match self {
            CacheLookup::Hit(value) => Some(value),
            CacheLookup::Miss => None,
        }
    }
}

/// Hit/miss marker callers can hand on without the value
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Hit,
    Miss,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TtlCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> CacheLookup<V> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> CacheLookup<V> {
        match self.entries.get(key) {
            Some(entry) if now - entry.inserted_at < self.ttl => CacheLookup::Hit(entry.value.clone()),
            _ => CacheLookup::Miss,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        self.insert_at(key, value, Utc::now());
    }

    pub fn insert_at(&mut self, key: impl Into<String>, value: V, inserted_at: DateTime<Utc>) {
        self.entries.insert(key.into(), CacheEntry { value, inserted_at });
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Drop every entry whose key starts with `prefix`
    pub fn remove_prefix(&mut self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        before - self.entries.len()
    }

    pub fn sweep_expired(&mut self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    pub fn sweep_expired_at(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| now - entry.inserted_at < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_within_ttl() {
        let mut cache = TtlCache::new(Duration::minutes(5));
        let now = Utc::now();
        cache.insert_at("a", 1, now);

        assert_eq!(cache.get_at("a", now + Duration::minutes(4)), CacheLookup::Hit(1));
        assert_eq!(cache.get_at("a", now + Duration::minutes(5)), CacheLookup::Miss);
        assert_eq!(cache.get_at("b", now), CacheLookup::Miss);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let mut cache = TtlCache::new(Duration::minutes(2));
        let now = Utc::now();
        cache.insert_at("old", "x", now - Duration::minutes(3));
        cache.insert_at("new", "y", now);

        assert_eq!(cache.sweep_expired_at(now), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_at("new", now).is_hit());
    }

    #[test]
    fn test_remove_prefix() {
        let mut cache = TtlCache::new(Duration::minutes(2));
        cache.insert("conv1:aaa", 1);
        cache.insert("conv1:bbb", 2);
        cache.insert("conv2:aaa", 3);

        assert_eq!(cache.remove_prefix("conv1:"), 2);
        assert_eq!(cache.get("conv2:aaa").into_option(), Some(3));
    }
}
