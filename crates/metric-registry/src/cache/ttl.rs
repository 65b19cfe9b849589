//! Volatility-driven TTL policy.
//!
//! A request is classified into a data type tag, the tag maps to a
//! [`VolatilityClass`], and the class gives a base TTL that is then adjusted
//! for off-hours and high-volatility periods.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CacheConfig;
use crate::models::Params;

/// Floor applied after the high-volatility halving.
pub const MIN_TTL_SECS: u64 = 5;

/// Tag used when no rule matches.
pub const DEFAULT_DATA_TYPE: &str = "medium_volatility_default";

/// Parameter that forces a data type, bypassing inference.
pub const DATA_TYPE_OVERRIDE_PARAM: &str = "_data_type_override";

/// How quickly a data type goes stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityClass {
    UltraHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

impl VolatilityClass {
    /// All classes in declaration order (base TTL non-decreasing).
    pub const ALL: [VolatilityClass; 5] = [
        Self::UltraHigh,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::VeryLow,
    ];

    pub fn base_ttl_secs(self) -> u64 {
        match self {
            Self::UltraHigh => 10,
            Self::High => 30,
            Self::Medium => 60,
            Self::Low => 300,
            Self::VeryLow => 900,
        }
    }

    /// Class for a data type tag. Unknown tags are `Medium`.
    pub fn for_data_type(data_type: &str) -> Self {
        DATA_TYPE_VOLATILITY
            .iter()
            .find(|(tag, _)| *tag == data_type)
            .map(|(_, class)| *class)
            .unwrap_or(Self::Medium)
    }
}

/// Known data type tags and their volatility class.
pub const DATA_TYPE_VOLATILITY: &[(&str, VolatilityClass)] = &[
    // Real-time trading data
    ("order_book", VolatilityClass::UltraHigh),
    ("order_book_depth", VolatilityClass::UltraHigh),
    ("live_price", VolatilityClass::UltraHigh),
    ("spread_analysis", VolatilityClass::UltraHigh),
    // Frequent price updates
    ("price_data", VolatilityClass::High),
    ("ohlcv_1m", VolatilityClass::High),
    ("ohlcv_5m", VolatilityClass::High),
    ("volume_analysis", VolatilityClass::High),
    ("arbitrage_opportunities", VolatilityClass::High),
    // Trading signals
    ("whale_movements", VolatilityClass::Medium),
    ("exchange_flows", VolatilityClass::Medium),
    ("ohlcv_1h", VolatilityClass::Medium),
    ("market_sentiment", VolatilityClass::Medium),
    ("technical_indicators", VolatilityClass::Medium),
    // Fundamentals
    ("network_metrics", VolatilityClass::Low),
    ("active_addresses", VolatilityClass::Low),
    ("hash_rate", VolatilityClass::Low),
    ("transactions_count", VolatilityClass::Low),
    ("ohlcv_4h", VolatilityClass::Low),
    ("ohlcv_1d", VolatilityClass::Low),
    // Historical / static
    ("market_cap", VolatilityClass::VeryLow),
    ("supply_metrics", VolatilityClass::VeryLow),
    ("token_info", VolatilityClass::VeryLow),
    ("historical_data", VolatilityClass::VeryLow),
];

/// Resolve a TTL with the default 5 second floor.
///
/// Off-hours doubles the base TTL; a high-volatility period halves it
/// (floored at [`MIN_TTL_SECS`]). Both may apply.
pub fn resolve_ttl(data_type: &str, market_hours: bool, high_volatility_period: bool) -> u64 {
    resolve_ttl_with_floor(data_type, market_hours, high_volatility_period, MIN_TTL_SECS)
}

fn resolve_ttl_with_floor(
    data_type: &str,
    market_hours: bool,
    high_volatility_period: bool,
    floor: u64,
) -> u64 {
    let mut ttl = VolatilityClass::for_data_type(data_type).base_ttl_secs();

    if !market_hours {
        ttl *= 2;
    }

    if high_volatility_period {
        ttl = (ttl / 2).max(floor);
    }

    ttl
}

/// Infer a data type tag from an endpoint and its parameters.
///
/// Resolution order:
/// 1. An explicit `_data_type_override` parameter.
/// 2. The longest known tag contained in the endpoint (ties broken
///    alphabetically, so table order never matters).
/// 3. Keyword rules (`order`+`book`, `ohlcv`/`candle` + `timeframe`, ...).
/// 4. [`DEFAULT_DATA_TYPE`].
pub fn infer_data_type(endpoint: &str, params: &Params) -> String {
    if let Some(Value::String(tag)) = params.get(DATA_TYPE_OVERRIDE_PARAM) {
        if !tag.is_empty() {
            return tag.clone();
        }
    }

    let endpoint = endpoint.to_lowercase();

    let known = DATA_TYPE_VOLATILITY
        .iter()
        .map(|(tag, _)| *tag)
        .filter(|tag| endpoint.contains(tag))
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| b.cmp(a)));
    if let Some(tag) = known {
        return tag.to_string();
    }

    let has = |needle: &str| endpoint.contains(needle);

    if has("order") && has("book") {
        "order_book".to_string()
    } else if has("ohlcv") || has("candle") {
        match params.get("timeframe") {
            Some(Value::String(tf)) if !tf.is_empty() => format!("ohlcv_{}", tf),
            Some(Value::Number(n)) => format!("ohlcv_{}", n),
            _ => "ohlcv_1h".to_string(),
        }
    } else if has("price") {
        "price_data".to_string()
    } else if has("whale") {
        "whale_movements".to_string()
    } else if has("exchange") && has("flow") {
        "exchange_flows".to_string()
    } else if has("active") && has("address") {
        "active_addresses".to_string()
    } else if has("hash") && has("rate") {
        "hash_rate".to_string()
    } else if has("network") {
        "network_metrics".to_string()
    } else {
        DEFAULT_DATA_TYPE.to_string()
    }
}

/// Wall-clock heuristics fed into [`resolve_ttl`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MarketConditions {
    pub market_hours: bool,
    pub high_volatility_period: bool,
}

/// TTL policy bound to a cache configuration.
#[derive(Clone, Debug)]
pub struct TtlPolicy {
    market_open_hour: u32,
    market_close_hour: u32,
    volatile_hours: Vec<u32>,
    min_ttl_secs: u64,
}

impl TtlPolicy {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            market_open_hour: config.market_open_hour,
            market_close_hour: config.market_close_hour,
            volatile_hours: config.volatile_hours.clone(),
            min_ttl_secs: config.min_ttl_secs,
        }
    }

    /// Market conditions at a given instant.
    ///
    /// Crypto trades around the clock; the active window approximates
    /// overlapping US/EU sessions.
    pub fn conditions_at(&self, now: DateTime<Utc>) -> MarketConditions {
        let hour = now.hour();
        MarketConditions {
            market_hours: (self.market_open_hour..=self.market_close_hour).contains(&hour),
            high_volatility_period: self.volatile_hours.contains(&hour),
        }
    }

    pub fn ttl_for(&self, data_type: &str, conditions: MarketConditions) -> u64 {
        resolve_ttl_with_floor(
            data_type,
            conditions.market_hours,
            conditions.high_volatility_period,
            self.min_ttl_secs,
        )
    }

    /// Infer the data type and TTL for a request at `now`.
    pub fn resolve_at(&self, endpoint: &str, params: &Params, now: DateTime<Utc>) -> (String, u64) {
        let data_type = infer_data_type(endpoint, params);
        let ttl = self.ttl_for(&data_type, self.conditions_at(now));
        (data_type, ttl)
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_base_ttls_are_non_decreasing() {
        let ttls: Vec<u64> = VolatilityClass::ALL.iter().map(|c| c.base_ttl_secs()).collect();
        assert_eq!(ttls, vec![10, 30, 60, 300, 900]);
        assert!(ttls.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_unknown_tag_defaults_to_medium() {
        assert_eq!(VolatilityClass::for_data_type("not_a_tag"), VolatilityClass::Medium);
        assert_eq!(resolve_ttl("not_a_tag", true, false), 60);
    }

    #[test]
    fn test_ultra_high_shorter_than_low() {
        assert!(resolve_ttl("order_book", true, false) < resolve_ttl("active_addresses", true, false));
    }

    #[test]
    fn test_off_hours_doubles() {
        assert_eq!(resolve_ttl("network_metrics", false, false), 600);
    }

    #[test]
    fn test_high_volatility_halves_with_floor() {
        assert_eq!(resolve_ttl("market_cap", true, true), 450);
        assert_eq!(resolve_ttl("order_book", true, true), 5);
    }

    #[test]
    fn test_adjustments_combine() {
        // 10 * 2 / 2
        assert_eq!(resolve_ttl("live_price", false, true), 10);
        // 30 * 2 / 2
        assert_eq!(resolve_ttl("price_data", false, true), 30);
    }

    #[test]
    fn test_infer_exact_tag() {
        assert_eq!(infer_data_type("metric_active_addresses", &Params::new()), "active_addresses");
        assert_eq!(infer_data_type("metric_market_cap", &Params::new()), "market_cap");
    }

    #[test]
    fn test_infer_prefers_longest_tag() {
        assert_eq!(
            infer_data_type("binance/order_book_depth", &Params::new()),
            "order_book_depth"
        );
    }

    #[test]
    fn test_infer_pattern_rules() {
        assert_eq!(infer_data_type("fetchOrderBook", &Params::new()), "order_book");
        assert_eq!(
            infer_data_type("fetch_ohlcv", &params(&[("timeframe", json!("5m"))])),
            "ohlcv_5m"
        );
        assert_eq!(infer_data_type("candles", &Params::new()), "ohlcv_1h");
        assert_eq!(infer_data_type("metric_price", &Params::new()), "price_data");
        assert_eq!(infer_data_type("metric_whale_activity", &Params::new()), "whale_movements");
        assert_eq!(infer_data_type("hashRate", &Params::new()), "hash_rate");
        assert_eq!(infer_data_type("something_else", &Params::new()), DEFAULT_DATA_TYPE);
    }

    #[test]
    fn test_infer_is_independent_of_param_order() {
        let a = params(&[("timeframe", json!("4h")), ("symbol", json!("BTC/USDT"))]);
        let b = params(&[("symbol", json!("BTC/USDT")), ("timeframe", json!("4h"))]);
        assert_eq!(infer_data_type("ohlcv", &a), infer_data_type("ohlcv", &b));
    }

    #[test]
    fn test_override_param() {
        let p = params(&[(DATA_TYPE_OVERRIDE_PARAM, json!("token_info"))]);
        assert_eq!(infer_data_type("anything", &p), "token_info");
    }

    #[test]
    fn test_conditions_at() {
        let policy = TtlPolicy::default();

        let quiet = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            policy.conditions_at(quiet),
            MarketConditions {
                market_hours: true,
                high_volatility_period: false
            }
        );

        let open = Utc.with_ymd_and_hms(2024, 3, 1, 6, 30, 0).unwrap();
        assert!(policy.conditions_at(open).high_volatility_period);

        let night = Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();
        assert!(!policy.conditions_at(night).market_hours);
    }

    #[test]
    fn test_resolve_at_off_hours() {
        let policy = TtlPolicy::default();
        let night = Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();
        let (data_type, ttl) = policy.resolve_at("network_metrics", &Params::new(), night);
        assert_eq!(data_type, "network_metrics");
        assert_eq!(ttl, 600);
    }
}
