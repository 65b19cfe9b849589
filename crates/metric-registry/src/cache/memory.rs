//! In-process cache backend.
//!
//! Expiry is measured with `tokio::time::Instant`, so tests can drive it with
//! `tokio::time::pause()` and `tokio::time::advance()`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use tokio::time::Instant;

use super::backend::CacheBackend;
use crate::errors::CacheError;

#[derive(Debug)]
struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Instant,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Thread-safe in-memory backend with TTL expiry.
pub struct InMemoryBackend {
    entries: Mutex<HashMap<String, StoredValue>>,
    available: AtomicBool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backend going down or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock_entries()
            .values()
            .filter(|v| v.is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, StoredValue>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("In-memory cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn ensure_available(&self) -> Result<(), CacheError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Unavailable("in-memory backend offline".to_string()))
        }
    }

    fn read_live(entries: &mut HashMap<String, StoredValue>, key: &str, now: Instant) -> Option<Vec<u8>> {
        match entries.get(key) {
            Some(value) if value.is_live(now) => Some(value.bytes.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.ensure_available()?;
        let now = Instant::now();
        Ok(Self::read_live(&mut self.lock_entries(), key, now))
    }

    async fn setex(&self, key: &str, ttl_secs: u64, value: Vec<u8>) -> Result<(), CacheError> {
        self.ensure_available()?;
        if ttl_secs == 0 {
            return Err(CacheError::Unavailable(format!(
                "invalid expire time for key '{}'",
                key
            )));
        }
        let Some(expires_at) = Instant::now().checked_add(Duration::from_secs(ttl_secs)) else {
            return Err(CacheError::Unavailable(format!(
                "expire time out of range for key '{}'",
                key
            )));
        };
        self.lock_entries().insert(
            key.to_string(),
            StoredValue {
                bytes: value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, CacheError> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut entries = self.lock_entries();
        Ok(keys
            .iter()
            .map(|key| Self::read_live(&mut entries, key, now))
            .collect())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut entries = self.lock_entries();
        entries.retain(|_, v| v.is_live(now));
        Ok(entries
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, CacheError> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut entries = self.lock_entries();
        Ok(keys
            .iter()
            .filter_map(|k| entries.remove(k))
            .filter(|v| v.is_live(now))
            .count())
    }
}

/// Match `text` against a pattern where `*` matches any run of characters.
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    // At least two parts from here on.
    let first = parts[0];
    let last = parts[parts.len() - 1];
    let Some(mut remaining) = text.strip_prefix(first) else {
        return false;
    };

    for part in &parts[1..parts.len() - 1] {
        match remaining.find(part) {
            Some(idx) => remaining = &remaining[idx + part.len()..],
            None => return false,
        }
    }

    remaining.len() >= last.len() && remaining.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("metric_cache:*", "metric_cache:metric_price:abc"));
        assert!(!glob_match("metric_cache:*", "other:metric_price:abc"));
        assert!(glob_match("*price*", "metric_cache:metric_price:abc"));
        assert!(glob_match("a*c", "abc"));
        assert!(!glob_match("a*c", "abd"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let backend = InMemoryBackend::new();
        backend.setex("k", 10, b"v".to_vec()).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_mget_is_aligned_with_keys() {
        let backend = InMemoryBackend::new();
        backend.setex("a", 60, b"1".to_vec()).await.unwrap();
        backend.setex("c", 60, b"3".to_vec()).await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let values = backend.mget(&keys).await.unwrap();
        assert_eq!(values, vec![Some(b"1".to_vec()), None, Some(b"3".to_vec())]);
    }

    #[tokio::test]
    async fn test_keys_and_delete() {
        let backend = InMemoryBackend::new();
        backend.setex("ns:a", 60, b"1".to_vec()).await.unwrap();
        backend.setex("ns:b", 60, b"2".to_vec()).await.unwrap();
        backend.setex("other:c", 60, b"3".to_vec()).await.unwrap();

        let mut keys = backend.keys("ns:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["ns:a", "ns:b"]);

        let deleted = backend
            .delete(&["ns:a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(backend.len(), 2);
    }

    #[tokio::test]
    async fn test_offline_backend_errors() {
        let backend = InMemoryBackend::new();
        backend.set_available(false);
        assert!(backend.get("k").await.is_err());
        assert!(backend.setex("k", 10, vec![]).await.is_err());

        backend.set_available(true);
        assert!(backend.setex("k", 10, vec![]).await.is_ok());
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let backend = InMemoryBackend::new();
        assert!(backend.setex("k", 0, b"v".to_vec()).await.is_err());
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_rejected() {
        let backend = InMemoryBackend::new();
        assert!(backend.setex("k", u64::MAX, b"v".to_vec()).await.is_err());
        assert!(backend.get("k").await.unwrap().is_none());
    }
}
