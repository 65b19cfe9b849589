//! Registered metric provider.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::capabilities::RateLimit;
use super::health::{HealthSnapshot, ProviderHealth};
use super::traits::MetricLoader;
use crate::errors::MetricError;
use crate::models::{MetricValue, Params, ProviderName};

/// A prioritized, health-tracked source for a set of metrics.
///
/// Health is the only mutable part of a provider and is only changed through
/// [`record_success`](Self::record_success),
/// [`record_failure`](Self::record_failure) and
/// [`reset_health`](Self::reset_health).
pub struct Provider {
    name: ProviderName,
    priority: u32,
    available_metrics: HashSet<String>,
    requires_credential: bool,
    loader: Arc<dyn MetricLoader>,
    health: ProviderHealth,
    rate_limit: Option<RateLimit>,
}

impl Provider {
    /// Lower `priority` is preferred.
    pub fn new(
        name: impl Into<ProviderName>,
        priority: u32,
        loader: Arc<dyn MetricLoader>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            available_metrics: HashSet::new(),
            requires_credential: false,
            loader,
            health: ProviderHealth::new(),
            rate_limit: None,
        }
    }

    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_metrics
            .extend(metrics.into_iter().map(Into::into));
        self
    }

    pub fn requires_credential(mut self, requires: bool) -> Self {
        self.requires_credential = requires;
        self
    }

    pub fn with_rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = Some(limit);
        self
    }

    /// Replace the health tracker with the registry's policy.
    pub(crate) fn with_health_policy(
        mut self,
        failure_threshold: u32,
        recovery_timeout: Option<Duration>,
    ) -> Self {
        self.health = ProviderHealth::with_policy(failure_threshold, recovery_timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn available_metrics(&self) -> &HashSet<String> {
        &self.available_metrics
    }

    pub fn needs_credential(&self) -> bool {
        self.requires_credential
    }

    pub fn rate_limit(&self) -> Option<&RateLimit> {
        self.rate_limit.as_ref()
    }

    /// True iff the provider advertises `metric` and is currently selectable.
    pub fn can_provide(&self, metric: &str) -> bool {
        self.advertises(metric) && self.health.is_selectable()
    }

    pub fn advertises(&self, metric: &str) -> bool {
        self.available_metrics.contains(metric)
    }

    /// Selection order key: `(priority, failure_count)`, lowest first.
    pub fn selection_key(&self) -> (u32, u32) {
        (self.priority, self.health.failure_count())
    }

    /// Invoke the loader. Health is not touched here.
    pub async fn fetch(
        &self,
        metric: &str,
        asset: &str,
        options: &Params,
    ) -> Result<MetricValue, MetricError> {
        self.loader.fetch(metric, asset, options).await
    }

    pub fn record_success(&self) {
        self.health.record_success(&self.name);
    }

    pub fn record_failure(&self) {
        self.health.record_failure(&self.name);
    }

    pub fn reset_health(&self) {
        self.health.reset(&self.name);
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }

    pub fn failure_count(&self) -> u32 {
        self.health.failure_count()
    }

    pub fn health(&self) -> HealthSnapshot {
        self.health.snapshot()
    }

    pub fn status(&self) -> ProviderStatus {
        let health = self.health.snapshot();
        ProviderStatus {
            priority: self.priority,
            healthy: health.is_healthy(),
            failure_count: health.failure_count,
            last_success: health.last_success,
            available_metrics: self.available_metrics.iter().cloned().collect(),
            requires_credential: self.requires_credential,
            rate_limited: self.rate_limit.is_some(),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("available_metrics", &self.available_metrics)
            .field("requires_credential", &self.requires_credential)
            .field("health", &self.health.snapshot())
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

/// Introspection record returned by `get_provider_status`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProviderStatus {
    pub priority: u32,
    pub healthy: bool,
    pub failure_count: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub available_metrics: BTreeSet<String>,
    pub requires_credential: bool,
    pub rate_limited: bool,
}
