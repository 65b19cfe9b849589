//! Per-provider health tracking.
//!
//! A provider is either **Healthy** or **Unhealthy**:
//!
//! - `record_success`: any state -> Healthy, failure count reset.
//! - `record_failure`: failure count incremented; at the threshold
//!   (default 3 consecutive failures) -> Unhealthy.
//! - `reset`: any state -> Healthy, failure count reset.
//!
//! Unhealthy providers are excluded from selection until reset. When a
//! recovery timeout is configured they become selectable again once the
//! timeout has elapsed since their last failure (a half-open probe); they
//! only report healthy after the probe succeeds.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::time::Instant;

/// Default consecutive failures before a provider is marked unhealthy.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Health state of a provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "Healthy"),
            Self::Unhealthy => write!(f, "Unhealthy"),
        }
    }
}

#[derive(Debug)]
struct HealthRecord {
    state: HealthState,
    failure_count: u32,
    last_success: Option<DateTime<Utc>>,
    last_failure: Option<Instant>,
}

impl HealthRecord {
    fn new() -> Self {
        Self {
            state: HealthState::Healthy,
            failure_count: 0,
            last_success: None,
            last_failure: None,
        }
    }
}

/// Point-in-time copy of a provider's health.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub state: HealthState,
    pub failure_count: u32,
    pub last_success: Option<DateTime<Utc>>,
}

impl HealthSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}

/// Thread-safe health tracker for one provider.
#[derive(Debug)]
pub struct ProviderHealth {
    record: Mutex<HealthRecord>,
    failure_threshold: u32,
    recovery_timeout: Option<Duration>,
}

impl ProviderHealth {
    pub fn new() -> Self {
        Self::with_policy(DEFAULT_FAILURE_THRESHOLD, None)
    }

    /// `recovery_timeout` of `None` keeps unhealthy providers excluded until
    /// an explicit reset.
    pub fn with_policy(failure_threshold: u32, recovery_timeout: Option<Duration>) -> Self {
        Self {
            record: Mutex::new(HealthRecord::new()),
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
        }
    }

    fn lock_record(&self) -> MutexGuard<'_, HealthRecord> {
        self.record.lock().unwrap_or_else(|poisoned| {
            warn!("Provider health mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn record_success(&self, provider: &str) {
        let mut record = self.lock_record();

        if record.state == HealthState::Unhealthy {
            info!("Provider '{}' recovered, marking healthy", provider);
        } else {
            debug!("Provider '{}' success, failure count reset", provider);
        }

        record.state = HealthState::Healthy;
        record.failure_count = 0;
        record.last_success = Some(Utc::now());
        record.last_failure = None;
    }

    pub fn record_failure(&self, provider: &str) {
        let mut record = self.lock_record();

        record.failure_count += 1;
        record.last_failure = Some(Instant::now());

        if record.failure_count >= self.failure_threshold {
            if record.state == HealthState::Healthy {
                warn!(
                    "Provider '{}' marked unhealthy after {} consecutive failures",
                    provider, record.failure_count
                );
            }
            record.state = HealthState::Unhealthy;
        } else {
            debug!(
                "Provider '{}' failure ({}/{})",
                provider, record.failure_count, self.failure_threshold
            );
        }
    }

    pub fn reset(&self, provider: &str) {
        let mut record = self.lock_record();
        if record.state == HealthState::Unhealthy || record.failure_count > 0 {
            info!("Provider '{}' health reset", provider);
        }
        record.state = HealthState::Healthy;
        record.failure_count = 0;
        record.last_failure = None;
    }

    /// Whether the provider may be selected for a call right now.
    pub fn is_selectable(&self) -> bool {
        let record = self.lock_record();
        match record.state {
            HealthState::Healthy => true,
            HealthState::Unhealthy => match (self.recovery_timeout, record.last_failure) {
                (Some(timeout), Some(last_failure)) => last_failure.elapsed() >= timeout,
                _ => false,
            },
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.lock_record().state == HealthState::Healthy
    }

    pub fn failure_count(&self) -> u32 {
        self.lock_record().failure_count
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let record = self.lock_record();
        HealthSnapshot {
            state: record.state,
            failure_count: record.failure_count,
            last_success: record.last_success,
        }
    }
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self::new()
    }
}
