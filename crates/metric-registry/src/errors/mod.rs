//! Error types and retry classification for the metric registry.
//!
//! This module provides:
//! - [`MetricError`]: The main error enum for registry and provider operations
//! - [`CacheError`]: Errors raised by cache backends (always absorbed by the cache manager)
//! - [`RetryClass`]: Classification for determining fallback behavior

mod retry;

pub use retry::RetryClass;

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during metric operations.
///
/// Each variant is classified into a [`RetryClass`] via the
/// [`retry_class`](Self::retry_class) method, which determines whether the
/// registry absorbs the error and falls back, or raises it to the caller.
#[derive(Error, Debug)]
pub enum MetricError {
    /// A provider's loader raised an error.
    #[error("Provider error: {provider} - {message}")]
    ProviderFailed {
        /// The provider whose loader failed
        provider: String,
        /// The error message from the loader
        message: String,
    },

    /// A provider returned an empty value (null, empty object/array/string).
    #[error("Empty result from provider: {provider}")]
    EmptyResult {
        /// The provider that returned nothing
        provider: String,
    },

    /// A provider call exceeded the configured per-call timeout.
    #[error("Timeout after {timeout:?}: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// No healthy provider advertises the metric.
    #[error("No providers available for metric: {metric}")]
    NoProvidersAvailable {
        /// The requested metric
        metric: String,
    },

    /// Every eligible provider was tried and all failed.
    #[error("All providers exhausted for {metric}:{asset}")]
    AllProvidersExhausted {
        /// The requested metric
        metric: String,
        /// The requested asset
        asset: String,
    },

    /// The request is structurally invalid (e.g. empty metric or asset).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The registry or cache configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A provider with the same name is already registered.
    #[error("Duplicate provider: {0}")]
    DuplicateProvider(String),
}

impl MetricError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use metric_registry::errors::{MetricError, RetryClass};
    ///
    /// let error = MetricError::EmptyResult { provider: "Glassnode".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::NextProvider);
    ///
    /// let error = MetricError::InvalidRequest("empty metric".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::ProviderFailed { .. } | Self::EmptyResult { .. } | Self::Timeout { .. } => {
                RetryClass::NextProvider
            }

            Self::NoProvidersAvailable { .. }
            | Self::AllProvidersExhausted { .. }
            | Self::InvalidRequest(_)
            | Self::Configuration(_)
            | Self::DuplicateProvider(_) => RetryClass::Never,
        }
    }

    /// Convenience constructor used by loader implementations.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderFailed {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by a cache backend.
///
/// The cache manager never propagates these; they degrade reads to misses and
/// writes to `false`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backend could not be reached or rejected the command.
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    /// A stored entry could not be encoded or decoded.
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        Self::Unavailable(e.to_string())
    }
}
