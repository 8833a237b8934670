//! Provider rate limiting configuration.

/// Rate limiting configuration for a provider.
///
/// Callers fanning out requests cap their in-flight calls at
/// `max_concurrency` so a burst does not get the client blocked.
#[derive(Clone, Debug)]
pub struct RateLimit {
    /// Maximum concurrent requests to this provider.
    pub max_concurrency: usize,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self { max_concurrency: 5 }
    }
}
