//! Ready-made [`MetricLoader`] adapters.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use super::traits::MetricLoader;
use crate::errors::MetricError;
use crate::models::{MetricValue, Params};

/// Wraps an async closure as a loader.
///
/// ```ignore
/// let loader = FnLoader::new(|metric, asset, _options| async move {
///     fetch_from_somewhere(&metric, &asset).await
/// });
/// ```
pub struct FnLoader<F, Fut> {
    func: F,
    _future: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnLoader<F, Fut>
where
    F: Fn(String, String, Params) -> Fut + Send + Sync,
    Fut: Future<Output = Result<MetricValue, MetricError>> + Send,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _future: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> MetricLoader for FnLoader<F, Fut>
where
    F: Fn(String, String, Params) -> Fut + Send + Sync,
    Fut: Future<Output = Result<MetricValue, MetricError>> + Send,
{
    async fn fetch(
        &self,
        metric: &str,
        asset: &str,
        options: &Params,
    ) -> Result<MetricValue, MetricError> {
        (self.func)(metric.to_string(), asset.to_string(), options.clone()).await
    }
}

/// Serves fixed values per metric, regardless of asset.
///
/// Useful as a last-resort fallback provider and in tests.
#[derive(Clone, Debug, Default)]
pub struct StaticLoader {
    name: String,
    values: HashMap<String, MetricValue>,
}

impl StaticLoader {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashMap::new(),
        }
    }

    pub fn with_value(mut self, metric: impl Into<String>, value: MetricValue) -> Self {
        self.values.insert(metric.into(), value);
        self
    }

    /// Metrics this loader has a value for.
    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

#[async_trait]
impl MetricLoader for StaticLoader {
    async fn fetch(
        &self,
        metric: &str,
        _asset: &str,
        _options: &Params,
    ) -> Result<MetricValue, MetricError> {
        self.values
            .get(metric)
            .cloned()
            .ok_or_else(|| MetricError::provider(&self.name, format!("no value for '{}'", metric)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_loader_passes_arguments() {
        let loader = FnLoader::new(|metric, asset, _options| async move {
            Ok(json!(format!("{}:{}", metric, asset)))
        });

        let value = loader.fetch("price", "BTC", &Params::new()).await.unwrap();
        assert_eq!(value, json!("price:BTC"));
    }

    #[tokio::test]
    async fn test_fn_loader_propagates_errors() {
        let loader = FnLoader::new(|_metric, _asset, _options| async move {
            Err(MetricError::provider("Custom", "rate limited"))
        });

        let err = loader.fetch("price", "BTC", &Params::new()).await.unwrap_err();
        assert!(matches!(err, MetricError::ProviderFailed { .. }));
    }

    #[tokio::test]
    async fn test_static_loader() {
        let loader = StaticLoader::new("MockProvider")
            .with_value("hash_rate", json!("245.7 TH/s"))
            .with_value("active_addresses", json!(1_000_000));

        assert_eq!(
            loader.fetch("hash_rate", "BTC", &Params::new()).await.unwrap(),
            json!("245.7 TH/s")
        );
        assert!(loader.fetch("price", "BTC", &Params::new()).await.is_err());
        assert_eq!(loader.metrics().count(), 2);
    }
}
