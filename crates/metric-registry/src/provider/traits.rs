//! Metric loader trait definitions.

use async_trait::async_trait;

use crate::errors::MetricError;
use crate::models::{MetricValue, Params};

/// A source of metric values for one external data provider.
///
/// Implement this trait to plug a new on-chain or market data source into
/// the registry. The registry handles priority, fallback, health tracking,
/// rate limiting and caching; a loader only fetches.
///
/// Loaders must be safe to call repeatedly and concurrently for different
/// requests, and must not hold state the registry depends on.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use metric_registry::provider::MetricLoader;
///
/// struct GlassnodeLoader {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl MetricLoader for GlassnodeLoader {
///     async fn fetch(&self, metric: &str, asset: &str, options: &Params)
///         -> Result<MetricValue, MetricError>
///     {
///         // ... call the API
///     }
/// }
/// ```
#[async_trait]
pub trait MetricLoader: Send + Sync {
    /// Fetch `metric` for `asset`.
    ///
    /// Returning an error or an empty value (null, `""`, `[]`, `{}`) counts as
    /// a provider failure and the registry moves on to the next provider.
    async fn fetch(
        &self,
        metric: &str,
        asset: &str,
        options: &Params,
    ) -> Result<MetricValue, MetricError>;
}
