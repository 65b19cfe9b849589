//! Smart-TTL cache manager.
//!
//! Wraps a [`CacheBackend`] with key derivation, volatility-driven TTLs,
//! batch operations, filtered invalidation and usage statistics.
//!
//! Backend failures are absorbed: reads become misses and writes report
//! `false`. The cache is an accelerator, never a dependency.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};

use super::backend::CacheBackend;
use super::entry::CacheEntry;
use super::key::{cache_key, namespace_pattern};
use super::memory::InMemoryBackend;
use super::stats::{recommendations, CacheCounters, CacheStats};
use super::ttl::{infer_data_type, TtlPolicy, DATA_TYPE_VOLATILITY};
use crate::config::CacheConfig;
use crate::errors::MetricError;
use crate::models::{MetricValue, Params};

/// A lookup inside [`CacheManager::get_batch`].
#[derive(Clone, Debug, PartialEq)]
pub struct CacheRequest {
    /// Caller-chosen identifier the result is reported under.
    pub id: String,
    pub endpoint: String,
    pub params: Params,
}

/// A write inside [`CacheManager::set_batch`].
#[derive(Clone, Debug)]
pub struct CacheWrite {
    pub endpoint: String,
    pub value: MetricValue,
    pub params: Params,
    /// Explicit TTL in seconds; `None` resolves a smart TTL.
    pub ttl: Option<u64>,
}

/// Filters for [`CacheManager::invalidate`]. An entry is deleted when it
/// matches any supplied filter; with no filters every managed key is deleted.
#[derive(Clone, Debug, Default)]
pub struct InvalidationFilter {
    /// Substrings matched against the entry's source endpoint.
    pub patterns: Vec<String>,
    /// Exact data type tags.
    pub data_types: Vec<String>,
    /// Entries strictly older than this.
    pub older_than: Option<Duration>,
}

impl InvalidationFilter {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.data_types.is_empty() && self.older_than.is_none()
    }

    fn matches(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        self.data_types.iter().any(|t| *t == entry.data_type)
            || self
                .older_than
                .is_some_and(|limit| entry.age(now) > limit)
            || self
                .patterns
                .iter()
                .any(|p| entry.source_endpoint.contains(p.as_str()))
    }
}

/// Cache manager layered over a key-value backend.
pub struct CacheManager {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
    policy: TtlPolicy,
    counters: CacheCounters,
}

impl CacheManager {
    /// Create a cache manager with default configuration.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        let config = CacheConfig::default();
        Self {
            backend,
            policy: TtlPolicy::new(&config),
            config,
            counters: CacheCounters::default(),
        }
    }

    /// Create a cache manager with custom configuration.
    pub fn with_config(
        backend: Arc<dyn CacheBackend>,
        config: CacheConfig,
    ) -> Result<Self, MetricError> {
        config.validate()?;
        Ok(Self {
            backend,
            policy: TtlPolicy::new(&config),
            config,
            counters: CacheCounters::default(),
        })
    }

    /// Cache manager over a fresh [`InMemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    /// Backend key for an endpoint and its parameters.
    pub fn key_for(&self, endpoint: &str, params: &Params) -> String {
        cache_key(&self.config.key_prefix, endpoint, params)
    }

    /// Look up a cached entry. Misses and backend failures both return `None`.
    pub async fn get(&self, endpoint: &str, params: &Params) -> Option<CacheEntry> {
        let key = self.key_for(endpoint, params);

        let entry = match self.backend.get(&key).await {
            Ok(Some(bytes)) => match CacheEntry::from_bytes(&bytes) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Discarding undecodable cache entry '{}': {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Cache retrieval error for '{}': {}", endpoint, e);
                None
            }
        };

        if entry.is_some() {
            self.counters.hit();
            debug!("Cache HIT: {}", endpoint);
        } else {
            self.counters.miss();
            debug!("Cache MISS: {}", endpoint);
        }
        entry
    }

    /// Store a value. Returns false when the backend rejected the write.
    pub async fn set(
        &self,
        endpoint: &str,
        value: MetricValue,
        params: &Params,
        ttl: Option<u64>,
    ) -> bool {
        let entry = self.build_entry(endpoint, value, params, ttl, Utc::now());

        let bytes = match entry.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cache storage error for '{}': {}", endpoint, e);
                return false;
            }
        };

        match self.backend.setex(&entry.key, entry.ttl_seconds, bytes).await {
            Ok(()) => {
                self.counters.sets(1);
                debug!("Cache SET: {} (TTL: {}s)", endpoint, entry.ttl_seconds);
                true
            }
            Err(e) => {
                warn!("Cache storage error for '{}': {}", endpoint, e);
                false
            }
        }
    }

    /// Look up many entries with a single multi-get.
    ///
    /// Every request id appears in the result; misses and backend failures
    /// map to `None`.
    pub async fn get_batch(&self, requests: &[CacheRequest]) -> HashMap<String, Option<CacheEntry>> {
        let keys: Vec<String> = requests
            .iter()
            .map(|r| self.key_for(&r.endpoint, &r.params))
            .collect();

        let values = match self.backend.mget(&keys).await {
            Ok(values) => values,
            Err(e) => {
                warn!("Batch cache retrieval error: {}", e);
                vec![None; requests.len()]
            }
        };

        let mut hits = 0u64;
        let results: HashMap<String, Option<CacheEntry>> = requests
            .iter()
            .zip(values)
            .map(|(request, bytes)| {
                let entry = bytes.and_then(|b| match CacheEntry::from_bytes(&b) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!("Invalid cache entry for {}: {}", request.endpoint, e);
                        None
                    }
                });
                if entry.is_some() {
                    hits += 1;
                }
                (request.id.clone(), entry)
            })
            .collect();

        self.counters.batch(hits);
        debug!("Batch cache: {} requests, {} hits", requests.len(), hits);
        results
    }

    /// Store many values in one pipelined write. Returns the number stored.
    ///
    /// The write is not atomic: on backend failure some entries may land and
    /// others not.
    pub async fn set_batch(&self, items: Vec<CacheWrite>) -> usize {
        if items.is_empty() {
            return 0;
        }

        let now = Utc::now();
        let total = items.len();
        let mut pipeline = Vec::with_capacity(total);
        for item in items {
            let entry = self.build_entry(&item.endpoint, item.value, &item.params, item.ttl, now);
            match entry.to_bytes() {
                Ok(bytes) => pipeline.push((entry.key, entry.ttl_seconds, bytes)),
                Err(e) => warn!("Skipping cache write for '{}': {}", item.endpoint, e),
            }
        }

        let stored = match self.backend.setex_many(pipeline).await {
            Ok(flags) => flags.into_iter().filter(|ok| *ok).count(),
            Err(e) => {
                warn!("Batch cache storage error: {}", e);
                0
            }
        };

        self.counters.sets(stored as u64);
        debug!("Batch cache SET: {}/{} successful", stored, total);
        stored
    }

    /// Populate entries that are not already cached.
    ///
    /// `fetch` is called once per missing entry; non-`None` results are stored
    /// with a smart TTL. Returns how many entries were warmed.
    pub async fn warm<F, Fut>(&self, requests: Vec<(String, Params)>, fetch: F) -> usize
    where
        F: Fn(String, Params) -> Fut,
        Fut: Future<Output = Option<MetricValue>>,
    {
        info!("Starting cache warming for {} endpoints", requests.len());
        let total = requests.len();
        let mut warmed = 0;

        for (endpoint, params) in requests {
            if self.get(&endpoint, &params).await.is_some() {
                continue;
            }
            if let Some(value) = fetch(endpoint.clone(), params.clone()).await {
                if self.set(&endpoint, value, &params, None).await {
                    warmed += 1;
                    debug!("Warmed cache for {}", endpoint);
                }
            }
        }

        info!("Cache warming complete: {}/{} endpoints", warmed, total);
        warmed
    }

    /// Delete managed entries matching any filter (all entries when empty).
    pub async fn invalidate(&self, filter: &InvalidationFilter) -> usize {
        self.invalidate_as_of(filter, Utc::now()).await
    }

    pub(crate) async fn invalidate_as_of(
        &self,
        filter: &InvalidationFilter,
        now: DateTime<Utc>,
    ) -> usize {
        let keys = match self.backend.keys(&namespace_pattern(&self.config.key_prefix)).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Smart invalidation error: {}", e);
                return 0;
            }
        };

        let doomed: Vec<String> = if filter.is_empty() {
            keys
        } else {
            let values = match self.backend.mget(&keys).await {
                Ok(values) => values,
                Err(e) => {
                    warn!("Smart invalidation error: {}", e);
                    return 0;
                }
            };
            keys.into_iter()
                .zip(values)
                .filter_map(|(key, bytes)| {
                    let entry = CacheEntry::from_bytes(&bytes?)
                        .map_err(|e| debug!("Error checking key {} for invalidation: {}", key, e))
                        .ok()?;
                    filter.matches(&entry, now).then_some(key)
                })
                .collect()
        };

        let deleted = self.delete_keys(&doomed).await;
        info!("Smart invalidation: {} entries deleted", deleted);
        deleted
    }

    /// Delete entries whose key starts with `{prefix}:{pattern}`.
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let glob = format!("{}:{}*", self.config.key_prefix, pattern);
        match self.backend.keys(&glob).await {
            Ok(keys) => {
                let deleted = self.delete_keys(&keys).await;
                info!("Invalidated {} cache entries matching: {}", deleted, pattern);
                deleted
            }
            Err(e) => {
                warn!("Cache invalidation error: {}", e);
                0
            }
        }
    }

    /// Delete every managed entry. Returns false when the backend is unreachable.
    pub async fn clear_all(&self) -> bool {
        let keys = match self.backend.keys(&namespace_pattern(&self.config.key_prefix)).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Cache clear error: {}", e);
                return false;
            }
        };
        if keys.is_empty() {
            return true;
        }
        match self.backend.delete(&keys).await {
            Ok(deleted) => {
                info!("Cleared metric cache: {} entries", deleted);
                true
            }
            Err(e) => {
                warn!("Cache clear error: {}", e);
                false
            }
        }
    }

    /// Usage statistics and tuning recommendations.
    pub async fn stats(&self) -> CacheStats {
        let (enabled, total_keys) = match self
            .backend
            .keys(&namespace_pattern(&self.config.key_prefix))
            .await
        {
            Ok(keys) => (true, keys.len()),
            Err(e) => {
                warn!("Cache stats error: {}", e);
                (false, 0)
            }
        };

        let snapshot = self.counters.snapshot();
        let hit_ratio = snapshot.hit_ratio();
        let batch_efficiency = snapshot.batch_efficiency();

        CacheStats {
            enabled,
            backend: self.backend.name().to_string(),
            hit_ratio,
            total_keys,
            hits: snapshot.hits,
            misses: snapshot.misses,
            sets: snapshot.sets,
            batch_requests: snapshot.batch_requests,
            batch_hits: snapshot.batch_hits,
            batch_efficiency,
            conditions: self.policy.conditions_at(Utc::now()),
            data_type_mappings: DATA_TYPE_VOLATILITY.len(),
            recommendations: recommendations(hit_ratio, batch_efficiency, snapshot.batch_requests),
        }
    }

    fn build_entry(
        &self,
        endpoint: &str,
        value: MetricValue,
        params: &Params,
        ttl: Option<u64>,
        now: DateTime<Utc>,
    ) -> CacheEntry {
        let (data_type, ttl_seconds) = match ttl {
            Some(ttl) => (infer_data_type(endpoint, params), ttl),
            None => self.policy.resolve_at(endpoint, params, now),
        };

        CacheEntry {
            key: self.key_for(endpoint, params),
            payload: value,
            cached_at: now,
            data_type,
            ttl_seconds,
            source_endpoint: endpoint.to_string(),
            source_params: params.clone(),
        }
    }

    async fn delete_keys(&self, keys: &[String]) -> usize {
        if keys.is_empty() {
            return 0;
        }
        match self.backend.delete(keys).await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!("Cache delete error: {}", e);
                0
            }
        }
    }
}
