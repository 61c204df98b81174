//! Error types for cache.

use std::fmt;

/// Failure modes for cache operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// The leader of a `get_or_compute` single-flight group was dropped
    /// (its task panicked or was canceled) before it broadcast a result.
    SingleFlightLeaderLost,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::SingleFlightLeaderLost => {
                write!(f, "single-flight leader task was lost before producing a result")
            }
        }
    }
}

impl std::error::Error for CacheError {}

