//! Rate limiting declaration for a provider.

/// Default burst capacity when a provider declares only a per-minute rate.
pub const DEFAULT_BURST_CAPACITY: f64 = 10.0;

/// Rate limit a provider declares for its upstream API.
///
/// Providers without a declared limit are never throttled.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimit {
    /// Maximum sustained requests per minute.
    pub requests_per_minute: u32,

    /// Maximum burst (token bucket capacity).
    pub burst_capacity: f64,
}

impl RateLimit {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            burst_capacity: DEFAULT_BURST_CAPACITY,
        }
    }

    pub fn with_burst(mut self, burst_capacity: f64) -> Self {
        self.burst_capacity = burst_capacity;
        self
    }
}
