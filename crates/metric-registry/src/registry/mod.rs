//! Metric registry module.
//!
//! This module provides orchestration for metric providers, including:
//! - Provider registration and priority ordering
//! - Fallback across providers with health tracking
//! - Batch optimization (deduplication, grouping, cache-first lookup)
//! - Optional per-provider rate limiting

pub mod batch;
mod rate_limiter;
mod registry;
mod skip_reason;
mod stats;

pub use batch::{Deduplicated, ProviderGroup, ProviderGroups};
pub use rate_limiter::RateLimiter;
pub use registry::{BatchOptimizationStats, MetricRegistry, RegistryBuilder, WarmReport};
pub use skip_reason::{FetchDiagnostics, ProviderAttempt, SkipReason};
pub use stats::{BatchPerformance, OptimizationEfficiency};
