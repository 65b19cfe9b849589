use std::collections::HashMap;

use serde::Serialize;

use super::types::{MetricValue, ProviderName};

/// Outcome of a single request inside a batch.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricOutcome {
    /// Served from the cache without calling any provider.
    Cached { value: MetricValue },

    /// Fetched from a provider during this batch.
    Fetched {
        value: MetricValue,
        provider: ProviderName,
    },

    /// No eligible provider, or the selected provider failed.
    Unavailable,
}

impl MetricOutcome {
    /// The value, if one was obtained.
    pub fn value(&self) -> Option<&MetricValue> {
        match self {
            Self::Cached { value } | Self::Fetched { value, .. } => Some(value),
            Self::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }

    /// Provider that produced a fresh value.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Fetched { provider, .. } => Some(provider),
            _ => None,
        }
    }
}

/// Result of a batch fetch, keyed by `metric:asset` request identifiers.
///
/// Every requested identifier has an entry; there is no ordering guarantee.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchResult {
    entries: HashMap<String, MetricOutcome>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, request_id: String, outcome: MetricOutcome) {
        self.entries.insert(request_id, outcome);
    }

    pub fn get(&self, request_id: &str) -> Option<&MetricOutcome> {
        self.entries.get(request_id)
    }

    /// The value for a request, or `None` when it was unavailable or never requested.
    pub fn value(&self, request_id: &str) -> Option<&MetricValue> {
        self.entries.get(request_id).and_then(MetricOutcome::value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that carry a value.
    pub fn available_count(&self) -> usize {
        self.entries.values().filter(|o| o.is_available()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetricOutcome)> {
        self.entries.iter()
    }

    pub fn into_inner(self) -> HashMap<String, MetricOutcome> {
        self.entries
    }
}

/// Options for [`MetricRegistry::get_metrics_batch`](crate::MetricRegistry::get_metrics_batch).
#[derive(Clone, Copy, Debug)]
pub struct BatchOptions {
    /// Consult and populate the cache.
    pub use_cache: bool,
    /// Maximum number of provider groups executed concurrently.
    pub max_concurrent: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            max_concurrent: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_accessors() {
        let fetched = MetricOutcome::Fetched {
            value: json!(116000),
            provider: "Glassnode".to_string(),
        };
        assert_eq!(fetched.value(), Some(&json!(116000)));
        assert_eq!(fetched.provider(), Some("Glassnode"));

        let cached = MetricOutcome::Cached { value: json!(1) };
        assert!(cached.is_available());
        assert_eq!(cached.provider(), None);

        assert!(!MetricOutcome::Unavailable.is_available());
        assert_eq!(MetricOutcome::Unavailable.value(), None);
    }

    #[test]
    fn test_batch_result_counts() {
        let mut result = BatchResult::new();
        result.insert("price:BTC".to_string(), MetricOutcome::Cached { value: json!(1) });
        result.insert("defi_tvl:BTC".to_string(), MetricOutcome::Unavailable);

        assert_eq!(result.len(), 2);
        assert_eq!(result.available_count(), 1);
        assert_eq!(result.value("price:BTC"), Some(&json!(1)));
        assert_eq!(result.value("defi_tvl:BTC"), None);
        assert_eq!(result.value("missing:BTC"), None);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(MetricOutcome::Unavailable).unwrap();
        assert_eq!(json, json!({"status": "unavailable"}));
    }
}
