//! Key-value backend contract.

use async_trait::async_trait;

use crate::errors::CacheError;

/// A key-value store with per-key expiry.
///
/// Any store satisfying this contract (in-process map, Redis, ...) can back a
/// [`CacheManager`](super::CacheManager). No transactional semantics are
/// assumed across keys.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short backend name for logs and stats.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value` under `key`, expiring after `ttl_secs`.
    async fn setex(&self, key: &str, ttl_secs: u64, value: Vec<u8>) -> Result<(), CacheError>;

    /// Fetch several keys in one round-trip. The result is aligned with `keys`.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, CacheError>;

    /// Pipelined `setex`. Returns one flag per item; a partial failure may
    /// leave some entries written and others not.
    async fn setex_many(&self, items: Vec<(String, u64, Vec<u8>)>) -> Result<Vec<bool>, CacheError> {
        let mut written = Vec::with_capacity(items.len());
        for (key, ttl, value) in items {
            written.push(self.setex(&key, ttl, value).await.is_ok());
        }
        Ok(written)
    }

    /// Keys matching a glob pattern (`*` wildcard).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Delete keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<usize, CacheError>;
}
