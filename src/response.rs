//! The outcome taxonomy and the record returned for a completed descriptor (§7).

use std::collections::HashMap;
use std::time::Duration;

/// How a descriptor's processing ultimately concluded (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Outcome {
    /// 2xx, or any status configured as success.
    Success,
    /// Non-success status, retryable per the retry policy.
    HttpError,
    /// The attempt exceeded its per-request timeout.
    Timeout,
    /// A network/TLS/DNS failure below the HTTP layer.
    TransportError,
    /// Rejected by the circuit breaker; never retried.
    CircuitOpen,
    /// A 429 response; retried honoring `Retry-After`.
    RateLimited,
    /// The entry crossed its wall-clock expiry before dispatch.
    Expired,
    /// Explicit cancellation or shutdown.
    Canceled,
    /// Submission was refused because the queue was full.
    QueueFull,
}

impl Outcome {
    /// `CIRCUIT_OPEN` is the one failure outcome that is never retried — it
    /// would immediately re-reject (§7).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Outcome::CircuitOpen | Outcome::Canceled | Outcome::QueueFull | Outcome::Expired)
    }
}

/// The result of a fully-processed descriptor: either a materialized
/// response or a terminal failure (§3).
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    pub status: Option<u16>,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub attempts: u32,
    pub total_wall_time: Duration,
    pub cache_hit: bool,
    pub outcome: Outcome,
}

impl ResponseRecord {
    pub fn success(
        status: u16,
        headers: HashMap<String, String>,
        body: Option<Vec<u8>>,
        attempts: u32,
        total_wall_time: Duration,
        cache_hit: bool,
    ) -> Self {
        Self {
            status: Some(status),
            headers,
            body,
            attempts,
            total_wall_time,
            cache_hit,
            outcome: Outcome::Success,
        }
    }

    pub fn failure(outcome: Outcome, attempts: u32, total_wall_time: Duration) -> Self {
        Self {
            status: None,
            headers: HashMap::new(),
            body: None,
            attempts,
            total_wall_time,
            cache_hit: false,
            outcome,
        }
    }

    /// The default cacheability policy (§3): only 2xx responses are stored
    /// unless the embedding caller overrides it via `EngineConfig`.
    pub fn is_default_cacheable(&self) -> bool {
        matches!(self.status, Some(status) if (200..300).contains(&status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_open_is_terminal() {
        assert!(Outcome::CircuitOpen.is_terminal());
        assert!(!Outcome::HttpError.is_terminal());
    }

    #[test]
    fn only_2xx_is_default_cacheable() {
        let ok = ResponseRecord::success(200, HashMap::new(), None, 1, Duration::ZERO, false);
        assert!(ok.is_default_cacheable());
        let redirect = ResponseRecord::success(301, HashMap::new(), None, 1, Duration::ZERO, false);
        assert!(!redirect.is_default_cacheable());
    }
}
