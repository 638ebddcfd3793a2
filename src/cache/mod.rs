/// Session cache for pending challenges and refresh sessions
///
/// Short-lived auth state lives only here, never in the relational store.
/// `CacheBackend` is the raw key/value seam (Redis in production, an
/// in-process map for development and tests). `SessionCache` adds key
/// prefixing and JSON encoding on top.

pub mod memory;
pub mod redis_cache;

pub use self::memory::MemoryCache;
pub use self::redis_cache::RedisCache;

use crate::config::CacheConfig;
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Raw key/value operations with per-key expiry
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> AuthResult<Option<String>>;

    /// Store a value that expires after `ttl_secs`
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> AuthResult<()>;

    /// Remove a key, returning whether it existed
    async fn delete(&self, key: &str) -> AuthResult<bool>;

    /// Remaining lifetime in seconds; `None` when the key is missing or has no expiry
    async fn ttl(&self, key: &str) -> AuthResult<Option<i64>>;
}

/// Typed, namespaced view over a `CacheBackend`
#[derive(Clone)]
pub struct SessionCache {
    backend: Arc<dyn CacheBackend>,
    key_prefix: String,
}

impl SessionCache {
    pub fn new(backend: Arc<dyn CacheBackend>, key_prefix: impl Into<String>) -> Self {
        Self {
            backend,
            key_prefix: key_prefix.into(),
        }
    }

    /// Connect the backend selected by configuration
    pub async fn from_config(config: &CacheConfig) -> AuthResult<Self> {
        let backend: Arc<dyn CacheBackend> = if config.enabled {
            Arc::new(RedisCache::connect(&config.redis_url).await?)
        } else {
            warn!("Redis disabled, using in-process session cache (single instance only)");
            Arc::new(MemoryCache::new())
        };

        Ok(Self::new(backend, config.key_prefix.clone()))
    }

    /// In-process cache with no prefix
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()), "")
    }

    /// Build a cache key with prefix
    fn build_key(&self, category: &str, key: &str) -> String {
        format!("{}{}{}", self.key_prefix, category, key)
    }

    /// Get and decode a value
    ///
    /// An entry that no longer decodes is deleted and reported as absent.
    pub async fn get<T: DeserializeOwned>(&self, category: &str, key: &str) -> AuthResult<Option<T>> {
        let cache_key = self.build_key(category, key);

        match self.backend.get(&cache_key).await? {
            Some(json) => match serde_json::from_str(&json) {
                Ok(value) => {
                    debug!(category, "cache hit");
                    Ok(Some(value))
                }
                Err(e) => {
                    warn!(category, "Failed to deserialize cached value: {}", e);
                    self.backend.delete(&cache_key).await?;
                    Ok(None)
                }
            },
            None => {
                debug!(category, "cache miss");
                Ok(None)
            }
        }
    }

    /// Encode and store a value with TTL
    pub async fn set<T: Serialize>(
        &self,
        category: &str,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> AuthResult<()> {
        let cache_key = self.build_key(category, key);

        let json = serde_json::to_string(value).map_err(|e| {
            error!("Failed to serialize value for cache: {}", e);
            AuthError::Cache(format!("Cache serialization failed: {}", e))
        })?;

        debug!(category, ttl_secs, "cache set");
        self.backend.set_ex(&cache_key, &json, ttl_secs).await
    }

    /// Delete a value, returning whether it existed
    pub async fn delete(&self, category: &str, key: &str) -> AuthResult<bool> {
        let cache_key = self.build_key(category, key);
        debug!(category, "cache delete");
        self.backend.delete(&cache_key).await
    }

    /// Remaining TTL of a value in seconds
    pub async fn ttl(&self, category: &str, key: &str) -> AuthResult<Option<i64>> {
        let cache_key = self.build_key(category, key);
        self.backend.ttl(&cache_key).await
    }
}

/// Cache category constants
pub mod categories {
    pub const CHALLENGE: &str = "challenge:";
    pub const REFRESH: &str = "refresh:";
}
