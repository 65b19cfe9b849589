//! Volatility-aware metric cache.
//!
//! - [`CacheManager`]: smart-TTL cache over any [`CacheBackend`]
//! - [`InMemoryBackend`]: in-process backend (default)
//! - `RedisBackend`: shared backend, behind the `redis` feature
//! - [`ttl`]: data type inference and TTL resolution

mod backend;
mod entry;
mod key;
mod manager;
mod memory;
#[cfg(feature = "redis")]
mod redis;
mod stats;
pub mod ttl;

pub use backend::CacheBackend;
pub use entry::CacheEntry;
pub use key::{cache_key, namespace_pattern};
pub use manager::{CacheManager, CacheRequest, CacheWrite, InvalidationFilter};
pub use memory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use self::redis::RedisBackend;
pub use stats::{
    recommendations, CacheStats, RECOMMEND_CHECK_STALENESS, RECOMMEND_INCREASE_TTL,
    RECOMMEND_MORE_BATCHING, RECOMMEND_START_BATCHING,
};
pub use ttl::{
    infer_data_type, resolve_ttl, MarketConditions, TtlPolicy, VolatilityClass,
    DATA_TYPE_OVERRIDE_PARAM, DEFAULT_DATA_TYPE, MIN_TTL_SECS,
};
