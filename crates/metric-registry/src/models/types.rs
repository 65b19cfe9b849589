use std::collections::BTreeMap;

use serde_json::Value;

/// Opaque metric payload as returned by a loader.
pub type MetricValue = Value;

/// Loader options and cache parameters.
///
/// A `BTreeMap` keeps keys sorted so serialization is order-independent.
pub type Params = BTreeMap<String, Value>;

/// Provider name, unique within a registry.
pub type ProviderName = String;

/// Returns true when a loader result carries no data.
///
/// `null`, empty strings, empty arrays and empty objects count as empty.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
