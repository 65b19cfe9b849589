//! Batch optimization counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Running counters updated by concurrent batch calls.
#[derive(Debug, Default)]
pub(crate) struct BatchCounters {
    total_batches: AtomicU64,
    total_items: AtomicU64,
    cache_hits: AtomicU64,
    calls_saved: AtomicU64,
    processed: AtomicU64,
}

impl BatchCounters {
    pub fn record_batch(&self, size: usize) {
        self.total_batches.fetch_add(1, Ordering::Relaxed);
        self.total_items.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn record_cache_hits(&self, hits: usize) {
        self.cache_hits.fetch_add(hits as u64, Ordering::Relaxed);
    }

    pub fn record_saved(&self, saved: usize) {
        self.calls_saved.fetch_add(saved as u64, Ordering::Relaxed);
    }

    pub fn record_processed(&self, processed: usize) {
        self.processed.fetch_add(processed as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BatchPerformance {
        let total_batches = self.total_batches.load(Ordering::Relaxed);
        let total_items = self.total_items.load(Ordering::Relaxed);
        BatchPerformance {
            total_batch_requests: total_batches,
            average_batch_size: if total_batches == 0 {
                0.0
            } else {
                round2(total_items as f64 / total_batches as f64)
            },
            cache_hits_in_batch: self.cache_hits.load(Ordering::Relaxed),
            provider_calls_saved: self.calls_saved.load(Ordering::Relaxed),
            concurrent_requests_processed: self.processed.load(Ordering::Relaxed),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Batch counters at a point in time.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BatchPerformance {
    pub total_batch_requests: u64,
    /// Running mean of requests per batch call.
    pub average_batch_size: f64,
    pub cache_hits_in_batch: u64,
    /// Provider calls avoided through cache hits and deduplication.
    pub provider_calls_saved: u64,
    /// Requests sent to provider groups.
    pub concurrent_requests_processed: u64,
}

/// Ratios derived from [`BatchPerformance`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OptimizationEfficiency {
    /// saved / max(saved + processed, 1)
    pub api_call_reduction_ratio: f64,
    /// cache hits / max(batches, 1)
    pub batch_cache_hit_ratio: f64,
}

impl From<&BatchPerformance> for OptimizationEfficiency {
    fn from(perf: &BatchPerformance) -> Self {
        let saved = perf.provider_calls_saved as f64;
        let processed = perf.concurrent_requests_processed as f64;
        Self {
            api_call_reduction_ratio: saved / (saved + processed).max(1.0),
            batch_cache_hit_ratio: perf.cache_hits_in_batch as f64
                / (perf.total_batch_requests as f64).max(1.0),
        }
    }
}
