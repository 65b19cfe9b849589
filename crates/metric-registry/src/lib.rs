//! Metric Registry Crate
//!
//! Multi-provider on-chain and market metric fetching with health-tracked
//! fallback, volatility-aware caching and batch optimization.
//!
//! # Overview
//!
//! - Providers are prioritized sources for a set of metrics; the registry
//!   tries them in order until one returns a value
//! - Providers that fail repeatedly are marked unhealthy and skipped
//! - Values are cached with a TTL derived from how volatile the data is
//! - Batch calls serve cache hits first, collapse duplicates and run one
//!   sequential task per provider under a bounded concurrency limit
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |     Caller       |  get_metric / get_metrics_batch / analysis
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |  MetricRegistry  | --> |  CacheManager    |  (smart TTL, batch get/set)
//! +------------------+     +------------------+
//!          |                        |
//!          v                        v
//! +------------------+     +------------------+
//! |  BatchOptimizer  |     |  CacheBackend    |  (in-memory, Redis)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+
//! |    Provider      |  (priority, metrics, health, rate limit)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |  MetricLoader    |  (external data source adapter)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`MetricRegistry`] - Orchestrator, built with [`RegistryBuilder`]
//! - [`Provider`] - A loader plus priority, advertised metrics and health
//! - [`MetricLoader`] - Trait implemented by data source adapters
//! - [`CacheManager`] - Smart-TTL cache over a [`CacheBackend`]
//! - [`MetricRequest`] / [`BatchResult`] - Batch input and output
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use metric_registry::{BatchOptions, MetricRegistry, MetricRequest, Provider, StaticLoader};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), metric_registry::MetricError> {
//! let fallback = StaticLoader::new("MockProvider").with_value("price", json!(116000));
//!
//! let registry = MetricRegistry::builder()
//!     .provider(Provider::new("MockProvider", 99, Arc::new(fallback)).with_metrics(["price"]))
//!     .build()?;
//!
//! let results = registry
//!     .get_metrics_batch(&[MetricRequest::new("price", "BTC")], BatchOptions::default())
//!     .await?;
//! assert!(results.get("price:BTC").is_some());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use cache::{
    CacheBackend, CacheEntry, CacheManager, CacheRequest, CacheStats, CacheWrite,
    InMemoryBackend, InvalidationFilter, TtlPolicy, VolatilityClass,
};
#[cfg(feature = "redis")]
pub use cache::RedisBackend;

pub use config::{CacheConfig, RegistryConfig};

pub use errors::{CacheError, MetricError, RetryClass};

pub use models::{
    AnalysisSection, BatchOptions, BatchResult, ComprehensiveAnalysis, MetricOutcome,
    MetricRequest, MetricValue, Params, ProviderName,
};

pub use provider::{
    FnLoader, HealthState, MetricLoader, Provider, ProviderStatus, RateLimit, StaticLoader,
};

pub use registry::{
    BatchOptimizationStats, FetchDiagnostics, MetricRegistry, RegistryBuilder, WarmReport,
};
