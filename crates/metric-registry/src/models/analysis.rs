use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Map;

use super::types::MetricValue;

/// Section of a comprehensive analysis a metric is filed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSection {
    NetworkHealth,
    MarketIndicators,
    AddressMetrics,
    WhaleMetrics,
    Other,
}

impl AnalysisSection {
    /// Static metric to section mapping.
    pub fn for_metric(metric: &str) -> Self {
        match metric {
            "hash_rate" | "transactions_count" | "network_health" => Self::NetworkHealth,
            "market_cap" | "price" | "nvt_ratio" | "mvrv_ratio" => Self::MarketIndicators,
            "active_addresses" => Self::AddressMetrics,
            "whale_activity" | "large_transactions" | "exchange_flows" => Self::WhaleMetrics,
            _ => Self::Other,
        }
    }
}

/// Multi-provider snapshot of a single asset.
#[derive(Clone, Debug, Serialize)]
pub struct ComprehensiveAnalysis {
    pub asset: String,
    pub timestamp: DateTime<Utc>,
    /// Providers that supplied at least one fresh value, sorted by name.
    pub data_sources: Vec<String>,
    /// Number of values served from the cache.
    pub cached_metrics: usize,
    pub network_health: Map<String, MetricValue>,
    pub market_indicators: Map<String, MetricValue>,
    pub address_metrics: Map<String, MetricValue>,
    pub whale_metrics: Map<String, MetricValue>,
    pub other_metrics: Map<String, MetricValue>,
    /// Key metrics that no provider could supply.
    pub unavailable: Vec<String>,
    pub summary: String,
}

impl ComprehensiveAnalysis {
    pub fn new(asset: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            asset: asset.to_uppercase(),
            timestamp,
            data_sources: Vec::new(),
            cached_metrics: 0,
            network_health: Map::new(),
            market_indicators: Map::new(),
            address_metrics: Map::new(),
            whale_metrics: Map::new(),
            other_metrics: Map::new(),
            unavailable: Vec::new(),
            summary: String::new(),
        }
    }

    /// File a metric value under its section.
    pub fn insert(&mut self, metric: &str, value: MetricValue) {
        let section = match AnalysisSection::for_metric(metric) {
            AnalysisSection::NetworkHealth => &mut self.network_health,
            AnalysisSection::MarketIndicators => &mut self.market_indicators,
            AnalysisSection::AddressMetrics => &mut self.address_metrics,
            AnalysisSection::WhaleMetrics => &mut self.whale_metrics,
            AnalysisSection::Other => &mut self.other_metrics,
        };
        section.insert(metric.to_string(), value);
    }
}
