//! The (scheme, host, port) triple used to key circuit breakers.

use std::fmt;
use url::Url;

/// A request's origin: scheme, host, and port, with the scheme's default
/// port filled in when the URL doesn't specify one explicitly.
///
/// Two requests to `https://api.example.com/a` and `https://api.example.com/b`
/// share an origin; `https://api.example.com` and `http://api.example.com`
/// do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    scheme: String,
    host: String,
    port: u16,
}

impl Origin {
    /// Parses the origin out of an absolute URL.
    ///
    /// Returns `None` if the URL has no host (e.g. `file:///tmp/x`) or
    /// can't be parsed at all.
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_string();
        let scheme = parsed.scheme().to_string();
        let port = parsed.port_or_known_default()?;
        Some(Self { scheme, host, port })
    }

    /// Builds an origin directly from its parts, for tests and call sites
    /// that already have the pieces apart.
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_host_different_paths_share_origin() {
        let a = Origin::from_url("https://api.example.com/a").unwrap();
        let b = Origin::from_url("https://api.example.com/b").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_schemes_are_different_origins() {
        let a = Origin::from_url("https://api.example.com/a").unwrap();
        let b = Origin::from_url("http://api.example.com/a").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn explicit_port_is_respected() {
        let a = Origin::from_url("https://api.example.com:8443/a").unwrap();
        let b = Origin::from_url("https://api.example.com/a").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn file_urls_have_no_origin() {
        assert!(Origin::from_url("file:///tmp/x").is_none());
    }
}
