//! Pure in-process cache implementation of [`Cache`], keyed by an arbitrary
//! `Eq + Hash` type with optional per-entry TTL.

use async_trait::async_trait;
use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use super::{Cache, CacheError};

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

/// In-memory TTL cache. Expired entries are evicted lazily on `get`.
pub struct InMemoryCache<K, V> {
    data: DashMap<K, Entry<V>>,
}

impl<K, V> InMemoryCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<K, V> Default for InMemoryCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for InMemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Option<V> {
        let entry = self.data.get(key)?;
        if let Some(expires_at) = entry.expires_at {
            if Instant::now() >= expires_at {
                drop(entry);
                self.data.remove(key);
                return None;
            }
        }
        Some(entry.value.clone())
    }

    async fn set(&self, key: K, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.data.insert(key, Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &K) -> Result<(), CacheError> {
        self.data.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.data.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// **Scenario**: a value without a TTL never expires.
    #[tokio::test]
    async fn no_ttl_never_expires() {
        let cache: InMemoryCache<String, String> = InMemoryCache::new();
        cache.set("k".into(), "v".into(), None).await.unwrap();
        assert_eq!(cache.get(&"k".to_string()).await, Some("v".to_string()));
    }

    /// **Scenario**: a value with an elapsed TTL is treated as absent and evicted.
    #[tokio::test]
    async fn expired_entry_is_evicted_on_get() {
        let cache: InMemoryCache<String, String> = InMemoryCache::new();
        cache
            .set("k".into(), "v".into(), Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get(&"k".to_string()).await, None);
        assert_eq!(cache.len(), 0);
    }

    /// **Scenario**: delete removes an entry regardless of TTL.
    #[tokio::test]
    async fn delete_removes_entry() {
        let cache: InMemoryCache<String, String> = InMemoryCache::new();
        cache.set("k".into(), "v".into(), None).await.unwrap();
        cache.delete(&"k".to_string()).await.unwrap();
        assert_eq!(cache.get(&"k".to_string()).await, None);
    }

    /// **Scenario**: clear empties the whole cache.
    #[tokio::test]
    async fn clear_empties_cache() {
        let cache: InMemoryCache<String, String> = InMemoryCache::new();
        cache.set("a".into(), "1".into(), None).await.unwrap();
        cache.set("b".into(), "2".into(), None).await.unwrap();
        cache.clear().await.unwrap();
        assert!(cache.is_empty());
    }
}
