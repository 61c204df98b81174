//! The `Transport` boundary (§6): the core treats wire-level HTTP as a
//! black box it calls exactly once per attempt. Connection pooling,
//! redirects, and TLS are the transport implementation's job.

use crate::descriptor::RequestDescriptor;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Transport-level failure classification (§6), distinct from an HTTP
/// status — these never reach the HTTP layer at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    Connect,
    Tls,
    Timeout,
    Dns,
    Protocol,
    Canceled,
    Other,
}

/// The result of a single attempt against a transport.
#[derive(Debug, Clone)]
pub struct TransportOutcome {
    pub status_code: Option<u16>,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub error_kind: Option<ErrorKind>,
    pub elapsed: Duration,
}

impl TransportOutcome {
    pub fn success(status_code: u16, headers: HashMap<String, String>, body: Option<Vec<u8>>, elapsed: Duration) -> Self {
        Self {
            status_code: Some(status_code),
            headers,
            body,
            error_kind: None,
            elapsed,
        }
    }

    pub fn error(kind: ErrorKind, elapsed: Duration) -> Self {
        Self {
            status_code: None,
            headers: HashMap::new(),
            body: None,
            error_kind: Some(kind),
            elapsed,
        }
    }
}

/// A single request attempt (§6). Implementations own connection pooling,
/// redirect following, and certificate validation; the dispatcher never
/// retries within a call to `send` — each call is exactly one attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, descriptor: &RequestDescriptor, deadline: Instant) -> TransportOutcome;
}
