//! Metric registry for orchestrating providers, fallback and caching.
//!
//! The registry owns the provider list and handles:
//! - Provider selection by advertised metric, health and priority
//! - Fallback to the next provider on failure
//! - Batch fetching with cache-first lookup, deduplication and bounded
//!   per-provider concurrency
//! - Optional per-provider rate limiting and per-call timeouts

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::Serialize;

use super::batch::{self, ProviderGroup};
use super::rate_limiter::RateLimiter;
use super::skip_reason::{FetchDiagnostics, SkipReason};
use super::stats::{BatchCounters, BatchPerformance, OptimizationEfficiency};
use crate::cache::{CacheManager, CacheStats, CacheWrite};
use crate::config::RegistryConfig;
use crate::errors::{MetricError, RetryClass};
use crate::models::{
    is_empty_value, BatchOptions, BatchResult, ComprehensiveAnalysis, MetricOutcome,
    MetricRequest, MetricValue, Params,
};
use crate::provider::{Provider, ProviderStatus};

/// Result of [`MetricRegistry::warm_critical_metrics`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WarmReport {
    pub total_requests: usize,
    pub successfully_warmed: usize,
    /// `"{warmed}/{total}"`
    pub cache_coverage: String,
}

/// Result of [`MetricRegistry::get_batch_optimization_stats`].
#[derive(Clone, Debug, Serialize)]
pub struct BatchOptimizationStats {
    pub batch_performance: BatchPerformance,
    pub optimization_efficiency: OptimizationEfficiency,
    pub cache_integration: CacheStats,
    pub provider_status: BTreeMap<String, ProviderStatus>,
}

/// Builder for [`MetricRegistry`].
pub struct RegistryBuilder {
    providers: Vec<Provider>,
    cache: Option<Arc<CacheManager>>,
    config: RegistryConfig,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            cache: None,
            config: RegistryConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers(mut self, providers: impl IntoIterator<Item = Provider>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Share a cache manager. Defaults to a private in-memory cache.
    pub fn cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate configuration and provider names, then build the registry.
    pub fn build(self) -> Result<MetricRegistry, MetricError> {
        self.config.validate()?;

        if self.providers.is_empty() {
            return Err(MetricError::Configuration(
                "a metric registry needs at least one provider".to_string(),
            ));
        }

        let registry = MetricRegistry {
            providers: RwLock::new(Vec::with_capacity(self.providers.len())),
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(CacheManager::in_memory())),
            rate_limiter: RateLimiter::new(),
            config: self.config,
            stats: BatchCounters::default(),
        };

        for provider in self.providers {
            registry.register(provider)?;
        }

        info!(
            "MetricRegistry initialized with {} providers",
            registry.read_providers().len()
        );
        Ok(registry)
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Provider registry with fallback, health tracking and batch optimization.
///
/// Construct one with [`MetricRegistry::builder`] and share it (e.g. in an
/// `Arc`) with callers; there is no global instance.
pub struct MetricRegistry {
    providers: RwLock<Vec<Arc<Provider>>>,
    cache: Arc<CacheManager>,
    rate_limiter: RateLimiter,
    config: RegistryConfig,
    stats: BatchCounters,
}

impl MetricRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    fn read_providers(&self) -> RwLockReadGuard<'_, Vec<Arc<Provider>>> {
        self.providers.read().unwrap_or_else(|poisoned| {
            warn!("Provider list lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_providers(&self) -> RwLockWriteGuard<'_, Vec<Arc<Provider>>> {
        self.providers.write().unwrap_or_else(|poisoned| {
            warn!("Provider list lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Providers sorted by priority, detached from the live list so that
    /// registrations during a call do not affect it.
    fn snapshot(&self) -> Vec<Arc<Provider>> {
        self.read_providers().clone()
    }

    fn register(&self, provider: Provider) -> Result<(), MetricError> {
        let provider = provider
            .with_health_policy(self.config.failure_threshold, self.config.recovery_timeout);

        let mut providers = self.write_providers();
        if providers.iter().any(|p| p.name() == provider.name()) {
            return Err(MetricError::DuplicateProvider(provider.name().to_string()));
        }

        if let Some(limit) = provider.rate_limit() {
            self.rate_limiter.configure(provider.name(), limit);
        }

        let position = providers
            .iter()
            .position(|p| p.priority() > provider.priority())
            .unwrap_or(providers.len());
        providers.insert(position, Arc::new(provider));
        Ok(())
    }

    /// Fetch a metric with fallback through providers.
    ///
    /// Returns `None` when no provider advertises the metric, every eligible
    /// provider is unhealthy, or all of them fail.
    pub async fn get_metric(
        &self,
        metric: &str,
        asset: &str,
        options: &Params,
    ) -> Option<MetricValue> {
        self.get_metric_with_diagnostics(metric, asset, options)
            .await
            .0
    }

    /// Like [`get_metric`](Self::get_metric), also returning the per-provider
    /// attempt log.
    ///
    /// Tries providers in order:
    /// 1. Skip providers that do not advertise the metric
    /// 2. Skip unhealthy providers
    /// 3. Sort the rest by `(priority, failure_count)`
    /// 4. Apply rate limiting, call the loader
    /// 5. First non-empty value wins; errors and empty values count as
    ///    failures and move on to the next provider
    pub async fn get_metric_with_diagnostics(
        &self,
        metric: &str,
        asset: &str,
        options: &Params,
    ) -> (Option<MetricValue>, FetchDiagnostics) {
        let mut diagnostics = FetchDiagnostics::new();
        let mut eligible = Vec::new();

        for provider in self.snapshot() {
            if !provider.advertises(metric) {
                diagnostics.record_skip(provider.name(), SkipReason::MetricNotSupported);
            } else if !provider.can_provide(metric) {
                diagnostics.record_skip(provider.name(), SkipReason::Unhealthy);
            } else {
                eligible.push(provider);
            }
        }
        eligible.sort_by_key(|p| p.selection_key());

        if eligible.is_empty() {
            warn!(
                "{}",
                MetricError::NoProvidersAvailable {
                    metric: metric.to_string()
                }
            );
            return (None, diagnostics);
        }

        debug!(
            "Fetching {} for {} with {} providers",
            metric,
            asset,
            eligible.len()
        );

        for provider in eligible {
            debug!("Trying provider '{}'", provider.name());
            match self.call_provider(&provider, metric, asset, options).await {
                Ok(value) => {
                    provider.record_success();
                    diagnostics.record_success(provider.name());
                    info!("{} fetched successfully from '{}'", metric, provider.name());
                    return (Some(value), diagnostics);
                }
                Err(e) => {
                    provider.record_failure();
                    warn!("Provider '{}' failed for {}: {}", provider.name(), metric, e);
                    diagnostics.record_error(provider.name(), e.to_string());
                }
            }
        }

        warn!(
            "{}",
            MetricError::AllProvidersExhausted {
                metric: metric.to_string(),
                asset: asset.to_string(),
            }
        );
        debug!("Attempts: {}", diagnostics.summary());
        (None, diagnostics)
    }

    /// Invoke one provider's loader under its rate limit and the configured
    /// timeout. Every error returned here is a provider failure.
    async fn call_provider(
        &self,
        provider: &Provider,
        metric: &str,
        asset: &str,
        options: &Params,
    ) -> Result<MetricValue, MetricError> {
        self.rate_limiter.acquire(provider.name()).await;

        let result = match self.config.call_timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, provider.fetch(metric, asset, options)).await {
                    Ok(result) => result,
                    Err(_) => Err(MetricError::Timeout {
                        provider: provider.name().to_string(),
                        timeout,
                    }),
                }
            }
            None => provider.fetch(metric, asset, options).await,
        };

        match result {
            Ok(value) if is_empty_value(&value) => Err(MetricError::EmptyResult {
                provider: provider.name().to_string(),
            }),
            Ok(value) => Ok(value),
            Err(e) if e.retry_class() == RetryClass::NextProvider => Err(e),
            // Loaders cannot raise structural errors on the caller's behalf.
            Err(e) => Err(MetricError::provider(provider.name(), e.to_string())),
        }
    }

    /// Fetch many metrics at once.
    ///
    /// 1. Cache hits (when `use_cache`) are served without provider calls
    /// 2. Remaining requests are deduplicated and grouped by best provider
    /// 3. Up to `max_concurrent` provider groups run at once; requests within
    ///    a group run sequentially
    /// 4. Fresh values are written back to the cache in one batch write
    ///
    /// Requests no provider can serve come back as
    /// [`MetricOutcome::Unavailable`]. There is no fallback inside a batch.
    ///
    /// Errors only for structurally invalid input: a blank metric or asset,
    /// or `max_concurrent == 0`.
    pub async fn get_metrics_batch(
        &self,
        requests: &[MetricRequest],
        options: BatchOptions,
    ) -> Result<BatchResult, MetricError> {
        if options.max_concurrent == 0 {
            return Err(MetricError::Configuration(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        for request in requests {
            request.validate()?;
        }
        if requests.is_empty() {
            return Ok(BatchResult::new());
        }

        self.stats.record_batch(requests.len());
        info!("Processing batch of {} metric requests", requests.len());

        let mut results = BatchResult::new();
        let mut saved = 0;

        let remaining: Vec<MetricRequest> = if options.use_cache {
            let cached = self.cache.get_batch(&batch::to_cache_keys(requests)).await;
            let mut remaining = Vec::new();
            let mut hits = 0;

            for request in requests {
                let id = request.request_id();
                match cached.get(&id) {
                    Some(Some(entry)) => {
                        results.insert(
                            id,
                            MetricOutcome::Cached {
                                value: entry.payload.clone(),
                            },
                        );
                        hits += 1;
                    }
                    _ => remaining.push(request.clone()),
                }
            }

            self.stats.record_cache_hits(hits);
            saved += hits;
            debug!("Cache hits: {}/{}", hits, requests.len());
            remaining
        } else {
            requests.to_vec()
        };

        if !remaining.is_empty() {
            let dedup = batch::deduplicate(&remaining);
            saved += dedup.redundant();

            let grouped = batch::group_by_provider(&dedup.unique, &self.snapshot());
            info!(
                "Optimized {} -> {} unique requests across {} providers",
                remaining.len(),
                dedup.unique.len(),
                grouped.groups.len()
            );

            for request in &grouped.unassigned {
                debug!("No eligible provider for {}", request);
                results.insert(request.request_id(), MetricOutcome::Unavailable);
            }

            let processed = grouped.assigned_count();
            let fetched: Vec<(MetricRequest, Option<(MetricValue, String)>)> =
                stream::iter(grouped.groups)
                    .map(|group| self.execute_group(group))
                    .buffer_unordered(options.max_concurrent)
                    .collect::<Vec<_>>()
                    .await
                    .into_iter()
                    .flatten()
                    .collect();
            self.stats.record_processed(processed);

            if options.use_cache {
                let writes: Vec<CacheWrite> = fetched
                    .iter()
                    .filter_map(|(request, outcome)| {
                        outcome.as_ref().map(|(value, _)| CacheWrite {
                            endpoint: batch::cache_endpoint(&request.metric),
                            value: value.clone(),
                            params: batch::cache_params(request),
                            ttl: None,
                        })
                    })
                    .collect();
                if !writes.is_empty() {
                    let cached = self.cache.set_batch(writes).await;
                    debug!("Cached {} fresh results", cached);
                }
            }

            for (request, outcome) in fetched {
                let outcome = match outcome {
                    Some((value, provider)) => MetricOutcome::Fetched { value, provider },
                    None => MetricOutcome::Unavailable,
                };
                results.insert(request.request_id(), outcome);
            }
        }

        self.stats.record_saved(saved);
        info!(
            "Batch complete: {}/{} available, {} provider calls saved",
            results.available_count(),
            results.len(),
            saved
        );
        Ok(results)
    }

    /// Run one provider's requests sequentially.
    async fn execute_group(
        &self,
        group: ProviderGroup,
    ) -> Vec<(MetricRequest, Option<(MetricValue, String)>)> {
        let provider = group.provider;
        let no_options = Params::new();
        let mut results = Vec::with_capacity(group.requests.len());

        for request in group.requests {
            let outcome = match self
                .call_provider(&provider, &request.metric, &request.asset, &no_options)
                .await
            {
                Ok(value) => {
                    provider.record_success();
                    Some((value, provider.name().to_string()))
                }
                Err(e) => {
                    provider.record_failure();
                    warn!(
                        "Provider '{}' failed for {}: {}",
                        provider.name(),
                        request,
                        e
                    );
                    None
                }
            };
            results.push((request, outcome));
        }

        debug!(
            "Provider '{}' batch completed: {} results",
            provider.name(),
            results.len()
        );
        results
    }

    /// Fetch the configured key metrics for an asset and file them by section.
    pub async fn get_comprehensive_analysis(
        &self,
        asset: &str,
    ) -> Result<ComprehensiveAnalysis, MetricError> {
        let requests: Vec<MetricRequest> = self
            .config
            .key_metrics
            .iter()
            .map(|metric| MetricRequest::new(metric.as_str(), asset))
            .collect();

        let options = BatchOptions {
            use_cache: true,
            max_concurrent: self.config.max_concurrent,
        };
        let results = self.get_metrics_batch(&requests, options).await?;

        let now = Utc::now();
        let mut analysis = ComprehensiveAnalysis::new(asset, now);

        for request in &requests {
            match results.get(&request.request_id()) {
                Some(MetricOutcome::Fetched { value, provider }) => {
                    analysis.insert(&request.metric, value.clone());
                    if !analysis.data_sources.contains(provider) {
                        analysis.data_sources.push(provider.clone());
                    }
                }
                Some(MetricOutcome::Cached { value }) => {
                    analysis.insert(&request.metric, value.clone());
                    analysis.cached_metrics += 1;
                }
                Some(MetricOutcome::Unavailable) | None => {
                    analysis.unavailable.push(request.metric.clone());
                }
            }
        }
        analysis.data_sources.sort();

        let total_providers = self.read_providers().len();
        let reliability = if analysis.data_sources.len() >= 2 {
            "Good"
        } else {
            "Limited"
        };
        analysis.summary = format!(
            "{} Multi-Provider Analysis:\n\
             - Data Sources: {}\n\
             - Coverage: {}/{} providers\n\
             - Reliability: {}\n\
             - Metrics: {}/{} available ({} from cache)\n\
             - Last Updated: {}",
            analysis.asset,
            analysis.data_sources.join(", "),
            analysis.data_sources.len(),
            total_providers,
            reliability,
            requests.len() - analysis.unavailable.len(),
            requests.len(),
            analysis.cached_metrics,
            now.format("%H:%M:%S"),
        );

        Ok(analysis)
    }

    /// Status of every provider, keyed by name.
    pub fn get_provider_status(&self) -> BTreeMap<String, ProviderStatus> {
        self.read_providers()
            .iter()
            .map(|p| (p.name().to_string(), p.status()))
            .collect()
    }

    /// Reset health for every provider.
    pub fn reset_all_providers(&self) {
        for provider in self.read_providers().iter() {
            provider.reset_health();
            self.rate_limiter.reset(provider.name());
        }
        info!("All provider health statuses and rate limits reset");
    }

    /// Register a provider at runtime.
    ///
    /// Calls already in flight keep using the provider list they started with.
    pub fn add_custom_provider(&self, provider: Provider) -> Result<(), MetricError> {
        let name = provider.name().to_string();
        self.register(provider)?;
        info!("Added custom provider: {}", name);
        Ok(())
    }

    /// Populate the cache for every asset x metric pair that is not cached yet,
    /// using the normal fallback path. `None` uses the configured defaults.
    pub async fn warm_critical_metrics(
        &self,
        assets: Option<&[String]>,
        metrics: Option<&[String]>,
    ) -> WarmReport {
        let assets = assets.unwrap_or(self.config.warm_assets.as_slice());
        let metrics = metrics.unwrap_or(self.config.warm_metrics.as_slice());

        info!(
            "Starting cache warming for {} assets x {} metrics",
            assets.len(),
            metrics.len()
        );

        let requests: Vec<MetricRequest> = assets
            .iter()
            .flat_map(|asset| {
                metrics
                    .iter()
                    .map(move |metric| MetricRequest::new(metric.as_str(), asset.as_str()))
            })
            .collect();

        let lookups: Vec<(String, Params)> = requests
            .iter()
            .map(|r| (batch::cache_endpoint(&r.metric), batch::cache_params(r)))
            .collect();

        let warmed = self
            .cache
            .warm(lookups, |_endpoint, params| async move {
                let field = |name: &str| {
                    params
                        .get(name)
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string()
                };
                let (metric, asset) = (field("metric"), field("asset"));
                self.get_metric(&metric, &asset, &Params::new()).await
            })
            .await;

        WarmReport {
            total_requests: requests.len(),
            successfully_warmed: warmed,
            cache_coverage: format!("{}/{}", warmed, requests.len()),
        }
    }

    /// Batch counters, derived ratios, cache statistics and provider status.
    pub async fn get_batch_optimization_stats(&self) -> BatchOptimizationStats {
        let batch_performance = self.stats.snapshot();
        BatchOptimizationStats {
            optimization_efficiency: OptimizationEfficiency::from(&batch_performance),
            batch_performance,
            cache_integration: self.cache.stats().await,
            provider_status: self.get_provider_status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryBackend;
    use crate::provider::{FnLoader, MetricLoader, RateLimit, StaticLoader};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockLoader {
        value: MetricValue,
        call_count: AtomicUsize,
        should_fail: bool,
    }

    impl MockLoader {
        fn new(value: MetricValue, should_fail: bool) -> Arc<Self> {
            Arc::new(Self {
                value,
                call_count: AtomicUsize::new(0),
                should_fail,
            })
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetricLoader for MockLoader {
        async fn fetch(
            &self,
            _metric: &str,
            asset: &str,
            _options: &Params,
        ) -> Result<MetricValue, MetricError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(MetricError::provider("mock", format!("failure for {}", asset)))
            } else {
                Ok(self.value.clone())
            }
        }
    }

    fn provider(name: &str, priority: u32, loader: Arc<MockLoader>, metrics: &[&str]) -> Provider {
        Provider::new(name, priority, loader).with_metrics(metrics.iter().copied())
    }

    #[test]
    fn test_build_requires_providers() {
        let err = MetricRegistry::builder().build().err().unwrap();
        assert!(matches!(err, MetricError::Configuration(_)));
    }

    #[test]
    fn test_build_rejects_duplicate_names() {
        let loader = MockLoader::new(json!(1), false);
        let err = MetricRegistry::builder()
            .provider(provider("Glassnode", 1, loader.clone(), &["price"]))
            .provider(provider("Glassnode", 2, loader, &["price"]))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, MetricError::DuplicateProvider(name) if name == "Glassnode"));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let loader = MockLoader::new(json!(1), false);
        let result = MetricRegistry::builder()
            .provider(provider("Glassnode", 1, loader, &["price"]))
            .config(RegistryConfig {
                failure_threshold: 0,
                ..Default::default()
            })
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_metric_uses_highest_priority() {
        let primary = MockLoader::new(json!("primary"), false);
        let secondary = MockLoader::new(json!("secondary"), false);

        let registry = MetricRegistry::builder()
            .provider(provider("Secondary", 2, secondary.clone(), &["price"]))
            .provider(provider("Primary", 1, primary.clone(), &["price"]))
            .build()
            .unwrap();

        let value = registry.get_metric("price", "BTC", &Params::new()).await;
        assert_eq!(value, Some(json!("primary")));
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);

        let status = registry.get_provider_status();
        assert!(status["Primary"].last_success.is_some());
    }

    #[tokio::test]
    async fn test_get_metric_falls_back_on_failure() {
        let failing = MockLoader::new(json!(null), true);
        let working = MockLoader::new(json!(42), false);

        let registry = MetricRegistry::builder()
            .provider(provider("Failing", 1, failing.clone(), &["price"]))
            .provider(provider("Working", 2, working.clone(), &["price"]))
            .build()
            .unwrap();

        let (value, diagnostics) = registry
            .get_metric_with_diagnostics("price", "BTC", &Params::new())
            .await;

        assert_eq!(value, Some(json!(42)));
        assert_eq!(failing.calls(), 1);
        assert_eq!(working.calls(), 1);
        assert_eq!(diagnostics.successful_provider(), Some("Working"));
        assert_eq!(diagnostics.errors().len(), 1);
        assert_eq!(registry.get_provider_status()["Failing"].failure_count, 1);
    }

    #[tokio::test]
    async fn test_empty_value_counts_as_failure() {
        let empty = MockLoader::new(json!({}), false);
        let working = MockLoader::new(json!(7), false);

        let registry = MetricRegistry::builder()
            .provider(provider("Empty", 1, empty, &["price"]))
            .provider(provider("Working", 2, working, &["price"]))
            .build()
            .unwrap();

        assert_eq!(
            registry.get_metric("price", "BTC", &Params::new()).await,
            Some(json!(7))
        );
        assert_eq!(registry.get_provider_status()["Empty"].failure_count, 1);
    }

    #[tokio::test]
    async fn test_unknown_metric_returns_none() {
        let loader = MockLoader::new(json!(1), false);
        let registry = MetricRegistry::builder()
            .provider(provider("Glassnode", 1, loader.clone(), &["price"]))
            .build()
            .unwrap();

        let (value, diagnostics) = registry
            .get_metric_with_diagnostics("defi_tvl", "BTC", &Params::new())
            .await;
        assert!(value.is_none());
        assert_eq!(loader.calls(), 0);
        assert_eq!(
            diagnostics.attempts[0].skipped,
            Some(SkipReason::MetricNotSupported)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_counts_as_failure() {
        let slow = FnLoader::new(|_metric, _asset, _options| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(json!("late"))
        });
        let fast = StaticLoader::new("Fast").with_value("price", json!("fast"));

        let registry = MetricRegistry::builder()
            .provider(Provider::new("Slow", 1, Arc::new(slow)).with_metrics(["price"]))
            .provider(Provider::new("Fast", 2, Arc::new(fast)).with_metrics(["price"]))
            .config(RegistryConfig {
                call_timeout: Some(Duration::from_secs(1)),
                ..Default::default()
            })
            .build()
            .unwrap();

        let (value, diagnostics) = registry
            .get_metric_with_diagnostics("price", "BTC", &Params::new())
            .await;
        assert_eq!(value, Some(json!("fast")));
        assert!(diagnostics.errors()[0].1.contains("Timeout"));
        assert_eq!(registry.get_provider_status()["Slow"].failure_count, 1);
    }

    #[tokio::test]
    async fn test_batch_rejects_invalid_input() {
        let loader = MockLoader::new(json!(1), false);
        let registry = MetricRegistry::builder()
            .provider(provider("Glassnode", 1, loader, &["price"]))
            .build()
            .unwrap();

        let err = registry
            .get_metrics_batch(&[MetricRequest::new("", "BTC")], BatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MetricError::InvalidRequest(_)));

        let err = registry
            .get_metrics_batch(
                &[MetricRequest::new("price", "BTC")],
                BatchOptions {
                    use_cache: true,
                    max_concurrent: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MetricError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_leaves_stats_untouched() {
        let loader = MockLoader::new(json!(1), false);
        let registry = MetricRegistry::builder()
            .provider(provider("Glassnode", 1, loader, &["price"]))
            .build()
            .unwrap();

        let requests = vec![MetricRequest::new("price", "BTC"); 4];
        registry
            .get_metrics_batch(&requests, BatchOptions::default())
            .await
            .unwrap();
        let results = registry
            .get_metrics_batch(&[], BatchOptions::default())
            .await
            .unwrap();
        assert!(results.is_empty());

        let perf = registry.get_batch_optimization_stats().await.batch_performance;
        assert_eq!(perf.total_batch_requests, 1);
        assert_eq!(perf.average_batch_size, 4.0);
    }

    #[tokio::test]
    async fn test_batch_groups_and_records_provenance() {
        let glassnode = MockLoader::new(json!(100), false);
        let dune = MockLoader::new(json!("whales"), false);

        let registry = MetricRegistry::builder()
            .provider(provider("Glassnode", 1, glassnode.clone(), &["price", "hash_rate"]))
            .provider(provider("Dune", 3, dune.clone(), &["whale_activity"]))
            .build()
            .unwrap();

        let requests = vec![
            MetricRequest::new("price", "BTC"),
            MetricRequest::new("hash_rate", "BTC"),
            MetricRequest::new("whale_activity", "BTC"),
            MetricRequest::new("defi_tvl", "BTC"),
        ];
        let results = registry
            .get_metrics_batch(&requests, BatchOptions::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(results.get("price:BTC").unwrap().provider(), Some("Glassnode"));
        assert_eq!(
            results.get("whale_activity:BTC").unwrap().provider(),
            Some("Dune")
        );
        assert_eq!(results.get("defi_tvl:BTC"), Some(&MetricOutcome::Unavailable));
        assert_eq!(glassnode.calls(), 2);
        assert_eq!(dune.calls(), 1);
    }

    #[tokio::test]
    async fn test_batch_without_cache_does_not_write_back() {
        let loader = MockLoader::new(json!(1), false);
        let backend = Arc::new(InMemoryBackend::new());
        let registry = MetricRegistry::builder()
            .provider(provider("Glassnode", 1, loader, &["price"]))
            .cache(Arc::new(CacheManager::new(backend.clone())))
            .build()
            .unwrap();

        registry
            .get_metrics_batch(
                &[MetricRequest::new("price", "BTC")],
                BatchOptions {
                    use_cache: false,
                    max_concurrent: 1,
                },
            )
            .await
            .unwrap();
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_batch_failure_is_recorded_without_fallback() {
        let failing = MockLoader::new(json!(null), true);
        let backup = MockLoader::new(json!(5), false);

        let registry = MetricRegistry::builder()
            .provider(provider("Failing", 1, failing, &["price"]))
            .provider(provider("Backup", 2, backup.clone(), &["price"]))
            .build()
            .unwrap();

        let results = registry
            .get_metrics_batch(&[MetricRequest::new("price", "BTC")], BatchOptions::default())
            .await
            .unwrap();

        assert_eq!(results.get("price:BTC"), Some(&MetricOutcome::Unavailable));
        assert_eq!(backup.calls(), 0);
        assert_eq!(registry.get_provider_status()["Failing"].failure_count, 1);
    }

    #[tokio::test]
    async fn test_add_custom_provider() {
        let loader = MockLoader::new(json!(1), false);
        let registry = MetricRegistry::builder()
            .provider(provider("Glassnode", 1, loader.clone(), &["price"]))
            .build()
            .unwrap();

        let custom = StaticLoader::new("Custom").with_value("defi_tvl", json!(9));
        registry
            .add_custom_provider(
                Provider::new("Custom", 5, Arc::new(custom)).with_metrics(["defi_tvl"]),
            )
            .unwrap();

        assert_eq!(
            registry.get_metric("defi_tvl", "ETH", &Params::new()).await,
            Some(json!(9))
        );
        assert!(matches!(
            registry.add_custom_provider(provider("Custom", 1, loader, &["price"])),
            Err(MetricError::DuplicateProvider(_))
        ));
        assert_eq!(registry.get_provider_status().len(), 2);
    }

    #[tokio::test]
    async fn test_reset_all_providers() {
        let failing = MockLoader::new(json!(null), true);
        let registry = MetricRegistry::builder()
            .provider(provider("Failing", 1, failing, &["price"]))
            .build()
            .unwrap();

        for _ in 0..3 {
            registry.get_metric("price", "BTC", &Params::new()).await;
        }
        assert!(!registry.get_provider_status()["Failing"].healthy);

        registry.reset_all_providers();
        let status = &registry.get_provider_status()["Failing"];
        assert!(status.healthy);
        assert_eq!(status.failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_all_providers_refills_rate_limits() {
        let loader = MockLoader::new(json!(1), false);
        let registry = MetricRegistry::builder()
            .provider(
                provider("Glassnode", 1, loader.clone(), &["price"])
                    .with_rate_limit(RateLimit::per_minute(1).with_burst(1.0)),
            )
            .build()
            .unwrap();

        registry.get_metric("price", "BTC", &Params::new()).await;
        registry.reset_all_providers();

        let start = tokio::time::Instant::now();
        registry.get_metric("price", "BTC", &Params::new()).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(loader.calls(), 2);
    }

    #[tokio::test]
    async fn test_rate_limited_provider_is_configured() {
        let loader = MockLoader::new(json!(1), false);
        let registry = MetricRegistry::builder()
            .provider(
                provider("Glassnode", 1, loader, &["price"])
                    .with_rate_limit(RateLimit::per_minute(600).with_burst(5.0)),
            )
            .build()
            .unwrap();

        assert!(registry.rate_limiter.is_limited("Glassnode"));
        assert!(registry.get_provider_status()["Glassnode"].rate_limited);
        assert_eq!(
            registry.get_metric("price", "BTC", &Params::new()).await,
            Some(json!(1))
        );
    }

    #[tokio::test]
    async fn test_comprehensive_analysis() {
        let glassnode = StaticLoader::new("Glassnode")
            .with_value("hash_rate", json!("245.7 TH/s"))
            .with_value("price", json!(116000));
        let dune = StaticLoader::new("Dune").with_value("whale_activity", json!({"large_tx": 12}));

        let registry = MetricRegistry::builder()
            .provider(
                Provider::new("Glassnode", 1, Arc::new(glassnode)).with_metrics(["hash_rate", "price"]),
            )
            .provider(Provider::new("Dune", 3, Arc::new(dune)).with_metrics(["whale_activity"]))
            .build()
            .unwrap();

        let analysis = registry.get_comprehensive_analysis("btc").await.unwrap();

        assert_eq!(analysis.asset, "BTC");
        assert_eq!(analysis.data_sources, vec!["Dune", "Glassnode"]);
        assert_eq!(analysis.network_health["hash_rate"], json!("245.7 TH/s"));
        assert_eq!(analysis.market_indicators["price"], json!(116000));
        assert_eq!(analysis.whale_metrics["whale_activity"], json!({"large_tx": 12}));
        assert_eq!(
            analysis.unavailable,
            vec!["active_addresses", "transactions_count", "market_cap"]
        );
        assert!(analysis.summary.contains("Reliability: Good"));
        assert!(analysis.summary.contains("Coverage: 2/2 providers"));

        // Second run is served from the cache.
        let again = registry.get_comprehensive_analysis("btc").await.unwrap();
        assert_eq!(again.cached_metrics, 3);
        assert!(again.data_sources.is_empty());
        assert!(again.summary.contains("Reliability: Limited"));
    }

    #[tokio::test]
    async fn test_warm_critical_metrics() {
        let loader = MockLoader::new(json!(1), false);
        let registry = MetricRegistry::builder()
            .provider(provider("Glassnode", 1, loader.clone(), &["price", "market_cap"]))
            .build()
            .unwrap();

        let assets = vec!["BTC".to_string(), "ETH".to_string()];
        let metrics = vec![
            "price".to_string(),
            "market_cap".to_string(),
            "whale_activity".to_string(),
        ];
        let report = registry
            .warm_critical_metrics(Some(&assets), Some(&metrics))
            .await;

        assert_eq!(report.total_requests, 6);
        assert_eq!(report.successfully_warmed, 4);
        assert_eq!(report.cache_coverage, "4/6");

        // Warmed entries are visible to batch calls.
        let results = registry
            .get_metrics_batch(&[MetricRequest::new("price", "ETH")], BatchOptions::default())
            .await
            .unwrap();
        assert!(matches!(
            results.get("price:ETH"),
            Some(MetricOutcome::Cached { .. })
        ));
        assert_eq!(loader.calls(), 4);
    }

    #[tokio::test]
    async fn test_batch_optimization_stats() {
        let loader = MockLoader::new(json!(1), false);
        let registry = MetricRegistry::builder()
            .provider(provider("Glassnode", 1, loader, &["price"]))
            .build()
            .unwrap();

        let requests = vec![MetricRequest::new("price", "BTC"), MetricRequest::new("price", "BTC")];
        registry
            .get_metrics_batch(&requests, BatchOptions::default())
            .await
            .unwrap();
        registry
            .get_metrics_batch(&requests, BatchOptions::default())
            .await
            .unwrap();

        let stats = registry.get_batch_optimization_stats().await;
        let perf = &stats.batch_performance;
        assert_eq!(perf.total_batch_requests, 2);
        assert_eq!(perf.average_batch_size, 2.0);
        assert_eq!(perf.cache_hits_in_batch, 2);
        // 1 duplicate in the first call, 2 cache hits in the second.
        assert_eq!(perf.provider_calls_saved, 3);
        assert_eq!(perf.concurrent_requests_processed, 1);
        assert_eq!(stats.optimization_efficiency.api_call_reduction_ratio, 0.75);
        assert_eq!(stats.optimization_efficiency.batch_cache_hit_ratio, 1.0);
        assert!(stats.provider_status.contains_key("Glassnode"));
        assert_eq!(stats.cache_integration.batch_requests, 2);
    }
}
