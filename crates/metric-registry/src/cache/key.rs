//! Cache key derivation.

use crate::models::Params;

/// Derive the backend key for an endpoint and its parameters.
///
/// Parameters are serialized in key order before hashing, so logically
/// identical requests map to the same key regardless of how the caller
/// assembled them. The endpoint is kept readable in the key for pattern
/// scans; the hash keeps long parameter sets within backend key limits.
pub fn cache_key(prefix: &str, endpoint: &str, params: &Params) -> String {
    let digest = md5::compute(canonical_request(endpoint, params));
    format!("{}:{}:{:x}", prefix, endpoint, digest)
}

/// Glob matching every key under a prefix.
pub fn namespace_pattern(prefix: &str) -> String {
    format!("{}:*", prefix)
}

fn canonical_request(endpoint: &str, params: &Params) -> String {
    let params = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}:{}", endpoint, params)
}
