//! Registry and cache configuration.
//!
//! Both structs have sensible defaults and can be overlaid from environment
//! variables with `from_env()`. Unparsable values are reported as
//! [`MetricError::Configuration`] instead of panicking.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::MetricError;

/// Default key namespace inside the cache backend.
pub const DEFAULT_KEY_PREFIX: &str = "metric_cache";

/// Metrics fetched by a comprehensive analysis.
pub const DEFAULT_KEY_METRICS: &[&str] = &[
    "active_addresses",
    "hash_rate",
    "transactions_count",
    "market_cap",
    "price",
    "whale_activity",
];

/// Assets warmed by default.
pub const DEFAULT_WARM_ASSETS: &[&str] = &["BTC", "ETH", "ADA", "SOL"];

/// Metrics warmed by default.
pub const DEFAULT_WARM_METRICS: &[&str] = &[
    "price",
    "active_addresses",
    "whale_activity",
    "exchange_flows",
    "market_cap",
    "hash_rate",
];

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Cache manager configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Namespace for every managed key.
    pub key_prefix: String,
    /// First UTC hour (inclusive) of the active trading window.
    pub market_open_hour: u32,
    /// Last UTC hour (inclusive) of the active trading window.
    pub market_close_hour: u32,
    /// UTC hours treated as high-volatility periods.
    pub volatile_hours: Vec<u32>,
    /// Floor applied after the high-volatility halving.
    pub min_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            market_open_hour: 6,
            market_close_hour: 22,
            volatile_hours: vec![6, 7, 20, 21],
            min_ttl_secs: 5,
        }
    }
}

impl CacheConfig {
    /// Defaults overlaid with `METRIC_CACHE_*` environment variables.
    ///
    /// - `METRIC_CACHE_KEY_PREFIX`
    /// - `METRIC_CACHE_MARKET_OPEN_HOUR`, `METRIC_CACHE_MARKET_CLOSE_HOUR`
    /// - `METRIC_CACHE_VOLATILE_HOURS` (comma separated)
    /// - `METRIC_CACHE_MIN_TTL_SECS`
    pub fn from_env() -> Result<Self, MetricError> {
        let mut config = Self::default();
        if let Some(prefix) = env_string("METRIC_CACHE_KEY_PREFIX") {
            config.key_prefix = prefix;
        }
        if let Some(hour) = env_parse("METRIC_CACHE_MARKET_OPEN_HOUR")? {
            config.market_open_hour = hour;
        }
        if let Some(hour) = env_parse("METRIC_CACHE_MARKET_CLOSE_HOUR")? {
            config.market_close_hour = hour;
        }
        if let Some(hours) = env_list("METRIC_CACHE_VOLATILE_HOURS") {
            config.volatile_hours = hours
                .iter()
                .map(|h| parse_value("METRIC_CACHE_VOLATILE_HOURS", h))
                .collect::<Result<_, _>>()?;
        }
        if let Some(secs) = env_parse("METRIC_CACHE_MIN_TTL_SECS")? {
            config.min_ttl_secs = secs;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MetricError> {
        if self.key_prefix.is_empty() {
            return Err(MetricError::Configuration(
                "cache key prefix must not be empty".to_string(),
            ));
        }
        if self.market_open_hour > 23 || self.market_close_hour > 23 {
            return Err(MetricError::Configuration(format!(
                "market hours must be within 0..=23 (got {}..={})",
                self.market_open_hour, self.market_close_hour
            )));
        }
        if let Some(hour) = self.volatile_hours.iter().find(|h| **h > 23) {
            return Err(MetricError::Configuration(format!(
                "volatile hour {} out of range",
                hour
            )));
        }
        Ok(())
    }
}

/// Metric registry configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Default concurrency for batch provider groups.
    pub max_concurrent: usize,
    /// Per-call loader timeout. `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
    /// Consecutive failures before a provider is marked unhealthy.
    pub failure_threshold: u32,
    /// When set, an unhealthy provider is probed again once this long has
    /// passed since its last failure. `None` keeps it excluded until reset.
    pub recovery_timeout: Option<Duration>,
    /// Metrics fetched by `get_comprehensive_analysis`.
    pub key_metrics: Vec<String>,
    /// Default assets for `warm_critical_metrics`.
    pub warm_assets: Vec<String>,
    /// Default metrics for `warm_critical_metrics`.
    pub warm_metrics: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            call_timeout: None,
            failure_threshold: 3,
            recovery_timeout: None,
            key_metrics: to_strings(DEFAULT_KEY_METRICS),
            warm_assets: to_strings(DEFAULT_WARM_ASSETS),
            warm_metrics: to_strings(DEFAULT_WARM_METRICS),
        }
    }
}

impl RegistryConfig {
    /// Defaults overlaid with `METRIC_REGISTRY_*` environment variables.
    ///
    /// - `METRIC_REGISTRY_MAX_CONCURRENT`
    /// - `METRIC_REGISTRY_CALL_TIMEOUT_MS`
    /// - `METRIC_REGISTRY_FAILURE_THRESHOLD`
    /// - `METRIC_REGISTRY_RECOVERY_TIMEOUT_SECS`
    /// - `METRIC_REGISTRY_KEY_METRICS`, `METRIC_REGISTRY_WARM_ASSETS`,
    ///   `METRIC_REGISTRY_WARM_METRICS` (comma separated)
    pub fn from_env() -> Result<Self, MetricError> {
        let mut config = Self::default();
        if let Some(n) = env_parse("METRIC_REGISTRY_MAX_CONCURRENT")? {
            config.max_concurrent = n;
        }
        if let Some(ms) = env_parse::<u64>("METRIC_REGISTRY_CALL_TIMEOUT_MS")? {
            config.call_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(n) = env_parse("METRIC_REGISTRY_FAILURE_THRESHOLD")? {
            config.failure_threshold = n;
        }
        if let Some(secs) = env_parse::<u64>("METRIC_REGISTRY_RECOVERY_TIMEOUT_SECS")? {
            config.recovery_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(metrics) = env_list("METRIC_REGISTRY_KEY_METRICS") {
            config.key_metrics = metrics;
        }
        if let Some(assets) = env_list("METRIC_REGISTRY_WARM_ASSETS") {
            config.warm_assets = assets;
        }
        if let Some(metrics) = env_list("METRIC_REGISTRY_WARM_METRICS") {
            config.warm_metrics = metrics;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MetricError> {
        if self.max_concurrent == 0 {
            return Err(MetricError::Configuration(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(MetricError::Configuration(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_list(name: &str) -> Option<Vec<String>> {
    env_string(name).map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, MetricError> {
    env_string(name)
        .map(|v| parse_value(name, &v))
        .transpose()
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T, MetricError> {
    raw.trim()
        .parse()
        .map_err(|_| MetricError::Configuration(format!("invalid value for {}: '{}'", name, raw)))
}
