use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::MetricError;

/// A single unit of work: one metric for one asset.
///
/// Identity is the `(metric, asset)` pair, compared case-sensitively.
/// Assets are not normalized at this layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricRequest {
    pub metric: String,
    pub asset: String,
}

impl MetricRequest {
    pub fn new(metric: impl Into<String>, asset: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            asset: asset.into(),
        }
    }

    /// Identifier used as the key of a [`BatchResult`](super::BatchResult).
    pub fn request_id(&self) -> String {
        format!("{}:{}", self.metric, self.asset)
    }

    /// Reject requests that can never be served.
    pub fn validate(&self) -> Result<(), MetricError> {
        if self.metric.trim().is_empty() {
            return Err(MetricError::InvalidRequest(format!(
                "empty metric for asset '{}'",
                self.asset
            )));
        }
        if self.asset.trim().is_empty() {
            return Err(MetricError::InvalidRequest(format!(
                "empty asset for metric '{}'",
                self.metric
            )));
        }
        Ok(())
    }
}

impl fmt::Display for MetricRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.metric, self.asset)
    }
}

impl<M: Into<String>, A: Into<String>> From<(M, A)> for MetricRequest {
    fn from((metric, asset): (M, A)) -> Self {
        Self::new(metric, asset)
    }
}
