/// Classification for retry policy.
///
/// Used by callers to decide whether a failed provider call is worth
/// repeating.
///
/// | Class | Retry? |
/// |-------|--------|
/// | `Never` | No |
/// | `WithBackoff` | Yes, after an exponentially growing delay |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - bad symbol, validation error, or terminal failure.
    /// The request is fundamentally invalid and retrying won't help.
    Never,

    /// Transient failure (rate limit, timeout, dropped connection).
    /// Retry the same call after a backoff delay.
    WithBackoff,
}

impl RetryClass {
    /// Whether the call should be attempted again.
    pub fn is_retryable(self) -> bool {
        matches!(self, RetryClass::WithBackoff)
    }
}
