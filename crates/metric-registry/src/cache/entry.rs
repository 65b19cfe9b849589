//! Serialized cache records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CacheError;
use crate::models::{MetricValue, Params};

/// A stored cache record. Immutable once written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: MetricValue,
    pub cached_at: DateTime<Utc>,
    pub data_type: String,
    pub ttl_seconds: u64,
    pub source_endpoint: String,
    pub source_params: Params,
}

impl CacheEntry {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CacheError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CacheError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Age relative to `now`; never negative.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.cached_at).max(Duration::zero())
    }
}
