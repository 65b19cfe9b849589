//! Metric registry models
//!
//! This module contains the core data types shared by the cache, provider and
//! registry layers:
//! - `types` - Type aliases for payloads, parameters and provider names
//! - `request` - The `(metric, asset)` unit of work (MetricRequest)
//! - `batch` - Batch outcomes and options (BatchResult, MetricOutcome, BatchOptions)
//! - `analysis` - Comprehensive multi-metric analysis record

mod analysis;
mod batch;
mod request;
mod types;

pub use analysis::{AnalysisSection, ComprehensiveAnalysis};
pub use batch::{BatchOptions, BatchResult, MetricOutcome};
pub use request::MetricRequest;
pub use types::{is_empty_value, MetricValue, Params, ProviderName};
