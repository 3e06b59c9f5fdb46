//! Cache layer
//!
//! Lookup lists that change rarely (thematic categories, difficulty levels)
//! are cached in process with moka and invalidated by the services that
//! write them.
//!
//! ```rust,ignore
//! use casipe::cache::{create_cache, CacheLayer};
//! use casipe::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("key", &"value", Duration::from_secs(60)).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Key for the ordered thematic category list
pub const CATEGORIES_KEY: &str = "temario:categories";
/// Prefix for all vocabulary lookups
pub const TEMARIO_PATTERN: &str = "temario:*";
/// Key for the ordered difficulty level list
pub const LEVELS_KEY: &str = "readers:levels";
/// Prefix for all reader lookups
pub const READERS_PATTERN: &str = "readers:*";

/// Cache operations over JSON-serializable values.
///
/// The methods are generic, so the trait is not object safe; services hold a
/// concrete `Arc<Cache>`.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key matching a glob pattern (`*` and `?`)
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Cache used by the services
pub type Cache = MemoryCache;

/// Build the cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<Cache> {
    Arc::new(MemoryCache::with_capacity_and_ttl(
        config.max_capacity,
        Duration::from_secs(config.ttl_seconds),
    ))
}
