//! Redis cache backend.
//!
//! Shares cached metrics between processes. Uses a multiplexed connection
//! per operation, so the client itself is cheap to clone.
//!
//! ```ignore
//! use metric_registry::cache::{CacheManager, RedisBackend};
//!
//! let backend = RedisBackend::new("redis://localhost:6379")?;
//! let cache = CacheManager::new(std::sync::Arc::new(backend));
//! ```

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};

use super::backend::CacheBackend;
use crate::errors::CacheError;

/// Redis-backed [`CacheBackend`].
#[derive(Clone)]
pub struct RedisBackend {
    client: Client,
}

impl RedisBackend {
    /// Open a client for a connection URL (e.g. `redis://localhost:6379`).
    ///
    /// No connection is made until the first command.
    pub fn new(connection_string: &str) -> Result<Self, CacheError> {
        let client = Client::open(connection_string).map_err(|e| {
            CacheError::Unavailable(format!("Failed to create Redis client: {}", e))
        })?;
        Ok(Self { client })
    }

    pub fn with_host_port(host: &str, port: u16) -> Result<Self, CacheError> {
        Self::new(&format!("redis://{}:{}", host, port))
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Unavailable(format!("Failed to get Redis connection: {}", e)))
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection().await?;
        Ok(conn.get::<_, Option<Vec<u8>>>(key).await?)
    }

    async fn setex(&self, key: &str, ttl_secs: u64, value: Vec<u8>) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        Ok(values)
    }

    async fn setex_many(&self, items: Vec<(String, u64, Vec<u8>)>) -> Result<Vec<bool>, CacheError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        for (key, ttl, value) in &items {
            pipe.cmd("SETEX").arg(key).arg(*ttl).arg(value.as_slice());
        }
        let replies: Vec<redis::Value> = pipe.query_async(&mut conn).await?;
        Ok(replies
            .iter()
            .map(|reply| matches!(reply, redis::Value::Okay))
            .collect())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connection().await?;
        Ok(conn.keys(pattern).await?)
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        Ok(conn.del(keys).await?)
    }
}
