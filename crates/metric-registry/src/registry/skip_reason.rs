//! Per-provider attempt log for a single metric fetch.

use serde::Serialize;

use crate::models::ProviderName;

/// Why a provider was not called.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Provider does not advertise the metric.
    MetricNotSupported,

    /// Provider is unhealthy and excluded from selection.
    Unhealthy,
}

/// Record of a single provider attempt during a fetch.
#[derive(Clone, Debug, Serialize)]
pub struct ProviderAttempt {
    pub provider: ProviderName,
    pub skipped: Option<SkipReason>,
    pub error: Option<String>,
    pub success: bool,
}

/// Detailed result of a fetch with skip diagnostics.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    pub fn record_skip(&mut self, provider: &str, reason: SkipReason) {
        self.attempts.push(ProviderAttempt {
            provider: provider.to_string(),
            skipped: Some(reason),
            error: None,
            success: false,
        });
    }

    pub fn record_error(&mut self, provider: &str, error: String) {
        self.attempts.push(ProviderAttempt {
            provider: provider.to_string(),
            skipped: None,
            error: Some(error),
            success: false,
        });
    }

    pub fn record_success(&mut self, provider: &str) {
        self.attempts.push(ProviderAttempt {
            provider: provider.to_string(),
            skipped: None,
            error: None,
            success: true,
        });
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| {
                if a.success {
                    format!("{}: SUCCESS", a.provider)
                } else if let Some(skip) = &a.skipped {
                    format!("{}: SKIPPED ({:?})", a.provider, skip)
                } else if let Some(err) = &a.error {
                    format!("{}: ERROR ({})", a.provider, err)
                } else {
                    format!("{}: UNKNOWN", a.provider)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Provider that supplied the value, if any.
    pub fn successful_provider(&self) -> Option<&str> {
        self.attempts
            .iter()
            .find(|a| a.success)
            .map(|a| a.provider.as_str())
    }

    pub fn errors(&self) -> Vec<(&str, &str)> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_deref().map(|e| (a.provider.as_str(), e)))
            .collect()
    }
}
