//! `RequestDescriptor` (§3): the immutable, fully-materialized unit of work
//! the core receives. Header assembly, body serialization, auth attachment,
//! and template expansion are the `RequestBuilder` collaborator's job
//! (§1); this crate only validates shape at [`RequestDescriptor::new`].

use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub use dispatch_queue::Priority;

/// HTTP methods the core will dispatch (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

/// Case-insensitive header mapping (§3). Keys are normalized to lowercase
/// on insert so lookups don't depend on the caller's casing.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    inner: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(key.into().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// Per-request overrides to the engine-wide `RetryPolicy` (§3).
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryOverrides {
    pub max_retries: Option<u32>,
    pub base_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
}

/// An immutable, fully-materialized unit of work (§3). Once submitted, a
/// descriptor's fields never change; retries and re-enqueues operate on
/// the `QueueEntry` wrapping it, not the descriptor itself.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub id: Uuid,
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
    pub cache_key_override: Option<String>,
    pub retry_overrides: RetryOverrides,
    pub priority: Priority,
    pub submitted_at: Instant,
    pub tags: HashMap<String, String>,
}

/// Fields the caller actually chooses; `id` and `submitted_at` are
/// system-assigned at construction.
pub struct RequestDescriptorBuilder {
    method: Method,
    url: String,
    headers: Headers,
    body: Option<Vec<u8>>,
    timeout: Duration,
    cache_key_override: Option<String>,
    retry_overrides: RetryOverrides,
    priority: Priority,
    tags: HashMap<String, String>,
}

impl RequestDescriptorBuilder {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
            timeout: Duration::from_secs(30),
            cache_key_override: None,
            retry_overrides: RetryOverrides::default(),
            priority: Priority::Normal,
            tags: HashMap::new(),
        }
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key_override = Some(key.into());
        self
    }

    pub fn retry_overrides(mut self, overrides: RetryOverrides) -> Self {
        self.retry_overrides = overrides;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Builds the descriptor, assigning a fresh id and stamping
    /// `submitted_at` with `now`.
    pub fn build(self, now: Instant) -> RequestDescriptor {
        RequestDescriptor {
            id: Uuid::new_v4(),
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            timeout: self.timeout,
            cache_key_override: self.cache_key_override,
            retry_overrides: self.retry_overrides,
            priority: self.priority,
            submitted_at: now,
            tags: self.tags,
        }
    }
}

impl RequestDescriptor {
    pub fn builder(method: Method, url: impl Into<String>) -> RequestDescriptorBuilder {
        RequestDescriptorBuilder::new(method, url)
    }

    /// The cache key (§3): `method|url|canonical(body)` unless the caller
    /// overrode it. "Canonical" here is the body's bytes verbatim — the
    /// core has no opinion on JSON/form canonicalization, that belongs to
    /// the RequestBuilder collaborator that produced the body.
    pub fn cache_key(&self) -> String {
        if let Some(key) = &self.cache_key_override {
            return key.clone();
        }
        match &self.body {
            Some(body) => format!("{}|{}|{}", self.method.as_str(), self.url, hex_digest(body)),
            None => format!("{}|{}|", self.method.as_str(), self.url),
        }
    }
}

/// A short, stable digest of the body bytes for the cache key — not
/// cryptographic, just collision-resistant enough to disambiguate bodies
/// without inlining arbitrarily large payloads into the key string.
fn hex_digest(bytes: &[u8]) -> String {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{hash:016x}")
}
