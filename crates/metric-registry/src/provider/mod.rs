//! Metric provider abstractions.
//!
//! This module contains:
//! - The [`MetricLoader`] trait that data source adapters implement
//! - [`Provider`]: a loader plus priority, advertised metrics and health
//! - [`ProviderHealth`]: the Healthy/Unhealthy state machine
//! - Ready-made loaders ([`FnLoader`], [`StaticLoader`])
//!
//! Loaders only fetch. Selection, fallback and health bookkeeping happen in
//! the registry.

mod capabilities;
mod health;
mod loaders;
mod provider;
mod traits;

pub use capabilities::{RateLimit, DEFAULT_BURST_CAPACITY};
pub use health::{HealthSnapshot, HealthState, ProviderHealth, DEFAULT_FAILURE_THRESHOLD};
pub use loaders::{FnLoader, StaticLoader};
pub use provider::{Provider, ProviderStatus};
pub use traits::MetricLoader;
