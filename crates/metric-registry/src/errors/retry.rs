/// Classification for fallback policy.
///
/// Used to determine how the registry should respond to errors raised while
/// fetching a metric.
///
/// # Behavior Summary
///
/// | Class | Try Next Provider? | Record Health Failure? | Surfaced to Caller? |
/// |-------|-------------------|------------------------|---------------------|
/// | `NextProvider` | Yes | Yes | No |
/// | `Never` | No | No | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// The provider could not supply the value (loader raised, returned
    /// nothing, or timed out). A failure is recorded against the provider
    /// and the next eligible provider is tried.
    NextProvider,

    /// The call itself is malformed or the registry is misconfigured.
    /// No provider can help, so the error is raised to the caller.
    Never,
}
