//! Cache usage counters and the recommendations rules engine.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::ttl::MarketConditions;

/// Lock-free counters shared by concurrent batch tasks.
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    batch_requests: AtomicU64,
    batch_hits: AtomicU64,
}

impl CacheCounters {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sets(&self, n: u64) {
        self.sets.fetch_add(n, Ordering::Relaxed);
    }

    pub fn batch(&self, hits: u64) {
        self.batch_requests.fetch_add(1, Ordering::Relaxed);
        self.batch_hits.fetch_add(hits, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            batch_requests: self.batch_requests.load(Ordering::Relaxed),
            batch_hits: self.batch_hits.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct CounterSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub batch_requests: u64,
    pub batch_hits: u64,
}

impl CounterSnapshot {
    /// hits / (hits + misses), 0 before any lookup.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Average hits per batch lookup, 0 before any batch.
    pub fn batch_efficiency(&self) -> f64 {
        if self.batch_requests == 0 {
            0.0
        } else {
            self.batch_hits as f64 / self.batch_requests as f64
        }
    }
}

/// Cache usage report.
#[derive(Clone, Debug, Serialize)]
pub struct CacheStats {
    /// False when the backend could not be queried.
    pub enabled: bool,
    pub backend: String,
    /// Fraction in `0.0..=1.0`.
    pub hit_ratio: f64,
    pub total_keys: usize,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub batch_requests: u64,
    pub batch_hits: u64,
    pub batch_efficiency: f64,
    pub conditions: MarketConditions,
    pub data_type_mappings: usize,
    pub recommendations: Vec<String>,
}

pub const RECOMMEND_INCREASE_TTL: &str = "Consider increasing TTL for stable data types";
pub const RECOMMEND_CHECK_STALENESS: &str =
    "TTL might be too long; verify data is not stale for freshness requirements";
pub const RECOMMEND_MORE_BATCHING: &str = "Use more batch requests to improve efficiency";
pub const RECOMMEND_START_BATCHING: &str =
    "Start using batch cache operations for better performance";

/// Tuning hints derived from current usage.
pub fn recommendations(hit_ratio: f64, batch_efficiency: f64, batch_requests: u64) -> Vec<String> {
    let mut out = Vec::new();

    if hit_ratio < 0.70 {
        out.push(RECOMMEND_INCREASE_TTL.to_string());
    }
    if hit_ratio > 0.95 {
        out.push(RECOMMEND_CHECK_STALENESS.to_string());
    }
    if batch_efficiency < 0.5 {
        out.push(RECOMMEND_MORE_BATCHING.to_string());
    }
    if batch_requests == 0 {
        out.push(RECOMMEND_START_BATCHING.to_string());
    }

    out
}
