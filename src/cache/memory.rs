//! In-memory cache implementation using moka
//!
//! Values are stored as JSON strings so any serializable type fits. The
//! builder TTL bounds every entry; a shorter per-entry TTL is enforced on
//! read.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_MAX_CAPACITY: u64 = 10_000;

const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T, ttl: Duration) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
            expires_at: Instant::now() + ttl,
        })
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    pub fn with_capacity_and_ttl(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(default_ttl)
            .build();

        Self { cache, default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Glob match supporting `*` (any run) and `?` (one character)
    fn pattern_matches(pattern: &str, key: &str) -> bool {
        let pattern: Vec<char> = pattern.chars().collect();
        let key: Vec<char> = key.chars().collect();
        Self::glob_match(&pattern, &key)
    }

    fn glob_match(pattern: &[char], key: &[char]) -> bool {
        match pattern.split_first() {
            None => key.is_empty(),
            Some(('*', rest)) => {
                Self::glob_match(rest, key) || (!key.is_empty() && Self::glob_match(pattern, &key[1..]))
            }
            Some(('?', rest)) => !key.is_empty() && Self::glob_match(rest, &key[1..]),
            Some((c, rest)) => key.first() == Some(c) && Self::glob_match(rest, &key[1..]),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) if entry.is_expired() => {
                self.cache.invalidate(key).await;
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.deserialize()?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(value, ttl.min(self.default_ttl))?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| Self::pattern_matches(pattern, key.as_ref()))
            .map(|(key, _)| (*key).clone())
            .collect();

        tracing::debug!("Invalidating {} cache entries matching '{}'", keys.len(), pattern);
        for key in keys {
            self.cache.invalidate(&key).await;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();
        cache.set("readers:levels", &vec![1, 2, 3], Duration::from_secs(60)).await.unwrap();

        let levels: Option<Vec<i32>> = cache.get("readers:levels").await.unwrap();
        assert_eq!(levels, Some(vec![1, 2, 3]));

        cache.delete("readers:levels").await.unwrap();
        let levels: Option<Vec<i32>> = cache.get("readers:levels").await.unwrap();
        assert!(levels.is_none());
    }

    #[tokio::test]
    async fn test_per_entry_ttl() {
        let cache = MemoryCache::new();
        cache.set("short", &"valor", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let value: Option<String> = cache.get("short").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_delete_pattern_keeps_other_keys() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("temario:categories", &1, ttl).await.unwrap();
        cache.set("temario:other", &2, ttl).await.unwrap();
        cache.set("readers:levels", &3, ttl).await.unwrap();

        cache.delete_pattern("temario:*").await.unwrap();

        assert!(cache.get::<i32>("temario:categories").await.unwrap().is_none());
        assert!(cache.get::<i32>("temario:other").await.unwrap().is_none());
        assert_eq!(cache.get::<i32>("readers:levels").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MemoryCache::new();
        cache.set("a", &1, Duration::from_secs(60)).await.unwrap();
        cache.clear().await.unwrap();
        assert!(cache.get::<i32>("a").await.unwrap().is_none());
    }

    #[test]
    fn test_glob_patterns() {
        assert!(MemoryCache::pattern_matches("temario:*", "temario:categories"));
        assert!(MemoryCache::pattern_matches("user:?:x", "user:1:x"));
        assert!(!MemoryCache::pattern_matches("user:?:x", "user:12:x"));
        assert!(MemoryCache::pattern_matches("*", ""));
    }

    proptest! {
        #[test]
        fn prop_star_suffix_matches_any_key_with_prefix(prefix in "[a-z]{1,8}", rest in "[a-z:0-9]{0,12}") {
            let key = format!("{}{}", prefix, rest);
            let pattern = format!("{}*", prefix);
            prop_assert!(MemoryCache::pattern_matches(&pattern, &key));
        }
    }
}
