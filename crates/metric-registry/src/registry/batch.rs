//! Batch optimizer: deduplication, provider grouping and cache key mapping.
//!
//! These are pure functions over a request list and a provider snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::cache::CacheRequest;
use crate::models::{MetricRequest, Params};
use crate::provider::Provider;

/// Result of [`deduplicate`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Deduplicated {
    /// First occurrence of each `(metric, asset)` pair, in input order.
    pub unique: Vec<MetricRequest>,
    /// Input index of each dropped duplicate, mapped to the input index of
    /// the first occurrence it aliases.
    pub aliases: HashMap<usize, usize>,
}

impl Deduplicated {
    /// Provider calls avoided by collapsing duplicates.
    pub fn redundant(&self) -> usize {
        self.aliases.len()
    }
}

/// Keep the first occurrence of every `(metric, asset)` pair.
pub fn deduplicate(requests: &[MetricRequest]) -> Deduplicated {
    let mut first_seen: HashMap<&MetricRequest, usize> = HashMap::new();
    let mut result = Deduplicated::default();

    for (index, request) in requests.iter().enumerate() {
        match first_seen.get(request) {
            Some(&first) => {
                result.aliases.insert(index, first);
            }
            None => {
                first_seen.insert(request, index);
                result.unique.push(request.clone());
            }
        }
    }

    result
}

/// Requests assigned to a single provider.
#[derive(Clone, Debug)]
pub struct ProviderGroup {
    pub provider: Arc<Provider>,
    pub requests: Vec<MetricRequest>,
}

/// Result of [`group_by_provider`].
#[derive(Clone, Debug, Default)]
pub struct ProviderGroups {
    /// Groups in order of first assignment.
    pub groups: Vec<ProviderGroup>,
    /// Requests with no eligible provider.
    pub unassigned: Vec<MetricRequest>,
}

impl ProviderGroups {
    pub fn assigned_count(&self) -> usize {
        self.groups.iter().map(|g| g.requests.len()).sum()
    }
}

/// Assign each request to the eligible provider with the lowest
/// `(priority, failure_count)`. Ties go to the provider listed first.
pub fn group_by_provider(requests: &[MetricRequest], providers: &[Arc<Provider>]) -> ProviderGroups {
    let mut result = ProviderGroups::default();
    let mut index_by_name: HashMap<String, usize> = HashMap::new();

    for request in requests {
        let best = providers
            .iter()
            .filter(|p| p.can_provide(&request.metric))
            .min_by_key(|p| p.selection_key());

        let Some(provider) = best else {
            result.unassigned.push(request.clone());
            continue;
        };

        let slot = *index_by_name
            .entry(provider.name().to_string())
            .or_insert_with(|| {
                result.groups.push(ProviderGroup {
                    provider: Arc::clone(provider),
                    requests: Vec::new(),
                });
                result.groups.len() - 1
            });
        result.groups[slot].requests.push(request.clone());
    }

    result
}

/// Cache endpoint for a metric.
pub fn cache_endpoint(metric: &str) -> String {
    format!("metric_{}", metric)
}

/// Cache parameters for a request: `{asset, metric}`.
pub fn cache_params(request: &MetricRequest) -> Params {
    let mut params = Params::new();
    params.insert("asset".to_string(), Value::String(request.asset.clone()));
    params.insert("metric".to_string(), Value::String(request.metric.clone()));
    params
}

/// Map requests onto cache lookups identified by request id.
pub fn to_cache_keys(requests: &[MetricRequest]) -> Vec<CacheRequest> {
    requests
        .iter()
        .map(|request| CacheRequest {
            id: request.request_id(),
            endpoint: cache_endpoint(&request.metric),
            params: cache_params(request),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticLoader;
    use serde_json::json;

    fn provider(name: &str, priority: u32, metrics: &[&str]) -> Arc<Provider> {
        Arc::new(
            Provider::new(name, priority, Arc::new(StaticLoader::new(name)))
                .with_metrics(metrics.iter().copied()),
        )
    }

    #[test]
    fn test_deduplicate_keeps_first_occurrence() {
        let requests = vec![
            MetricRequest::new("price", "BTC"),
            MetricRequest::new("price", "ETH"),
            MetricRequest::new("price", "BTC"),
            MetricRequest::new("price", "BTC"),
        ];

        let dedup = deduplicate(&requests);
        assert_eq!(
            dedup.unique,
            vec![MetricRequest::new("price", "BTC"), MetricRequest::new("price", "ETH")]
        );
        assert_eq!(dedup.aliases.get(&2), Some(&0));
        assert_eq!(dedup.aliases.get(&3), Some(&0));
        assert_eq!(dedup.redundant(), 2);
    }

    #[test]
    fn test_deduplicate_is_case_sensitive() {
        let requests = vec![MetricRequest::new("price", "BTC"), MetricRequest::new("price", "btc")];
        assert_eq!(deduplicate(&requests).unique.len(), 2);
    }

    #[test]
    fn test_group_by_provider_picks_best_eligible() {
        let glassnode = provider("Glassnode", 1, &["price", "hash_rate"]);
        let dune = provider("Dune", 3, &["price", "whale_activity"]);
        let providers = vec![Arc::clone(&glassnode), Arc::clone(&dune)];

        let requests = vec![
            MetricRequest::new("price", "BTC"),
            MetricRequest::new("whale_activity", "BTC"),
            MetricRequest::new("hash_rate", "BTC"),
            MetricRequest::new("unknown_metric", "BTC"),
        ];
        let grouped = group_by_provider(&requests, &providers);

        assert_eq!(grouped.groups.len(), 2);
        assert_eq!(grouped.groups[0].provider.name(), "Glassnode");
        assert_eq!(grouped.groups[0].requests.len(), 2);
        assert_eq!(grouped.groups[1].provider.name(), "Dune");
        assert_eq!(grouped.unassigned, vec![MetricRequest::new("unknown_metric", "BTC")]);
        assert_eq!(grouped.assigned_count(), 3);
    }

    #[test]
    fn test_group_by_provider_prefers_fewer_failures_at_equal_priority() {
        let a = provider("A", 1, &["price"]);
        let b = provider("B", 1, &["price"]);
        a.record_failure();

        let grouped = group_by_provider(&[MetricRequest::new("price", "BTC")], &[a, b]);
        assert_eq!(grouped.groups[0].provider.name(), "B");
    }

    #[test]
    fn test_group_by_provider_skips_unhealthy() {
        let a = provider("A", 1, &["price"]);
        for _ in 0..3 {
            a.record_failure();
        }

        let grouped = group_by_provider(&[MetricRequest::new("price", "BTC")], &[a]);
        assert!(grouped.groups.is_empty());
        assert_eq!(grouped.unassigned.len(), 1);
    }

    #[test]
    fn test_to_cache_keys() {
        let keys = to_cache_keys(&[MetricRequest::new("hash_rate", "BTC")]);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].id, "hash_rate:BTC");
        assert_eq!(keys[0].endpoint, "metric_hash_rate");
        assert_eq!(keys[0].params.get("asset"), Some(&json!("BTC")));
        assert_eq!(keys[0].params.get("metric"), Some(&json!("hash_rate")));
    }
}
