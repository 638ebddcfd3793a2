/// Redis cache backend
use super::CacheBackend;
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{error, info, warn};

/// Redis connection shared by all requests
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connect and verify the server answers PING
    pub async fn connect(redis_url: &str) -> AuthResult<Self> {
        info!("Connecting to Redis");

        let client = Client::open(redis_url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            AuthError::Cache(format!("Redis client creation failed: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            AuthError::Cache(format!("Redis connection failed: {}", e))
        })?;

        let cache = Self { connection };
        cache.ping().await?;

        info!("✓ Redis connection established");
        Ok(cache)
    }

    /// Ping Redis to check connection
    pub async fn ping(&self) -> AuthResult<()> {
        let mut conn = self.connection.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis PING failed: {}", e);
                AuthError::Cache(format!("Cache ping failed: {}", e))
            })?;

        if pong != "PONG" {
            return Err(AuthError::Cache(
                "Unexpected Redis PING response".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        let mut conn = self.connection.clone();
        conn.get(key).await.map_err(|e| {
            warn!("Redis GET failed: {}", e);
            AuthError::Cache(format!("Cache get failed: {}", e))
        })
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> AuthResult<()> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| {
                warn!("Redis SET failed: {}", e);
                AuthError::Cache(format!("Cache set failed: {}", e))
            })
    }

    async fn delete(&self, key: &str) -> AuthResult<bool> {
        let mut conn = self.connection.clone();
        let removed: i64 = conn.del(key).await.map_err(|e| {
            warn!("Redis DELETE failed: {}", e);
            AuthError::Cache(format!("Cache delete failed: {}", e))
        })?;
        Ok(removed > 0)
    }

    async fn ttl(&self, key: &str) -> AuthResult<Option<i64>> {
        let mut conn = self.connection.clone();
        let ttl: i64 = conn.ttl(key).await.map_err(|e| {
            warn!("Redis TTL failed: {}", e);
            AuthError::Cache(format!("Cache TTL check failed: {}", e))
        })?;

        // -2 missing key, -1 no expiry
        Ok(if ttl >= 0 { Some(ttl) } else { None })
    }
}
