use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default User-Agent header value
pub const DEFAULT_USER_AGENT: &str = concat!("restwire/", env!("CARGO_PKG_VERSION"));

/// Default response body limit (10 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// TLS root certificate source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Mozilla root certificates bundled with webpki-roots
    #[default]
    WebPki,
    /// Operating system certificate store
    Native,
}

/// Whether plain HTTP is accepted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TransportSecurity {
    /// HTTPS only; `http://` URLs fail with `UnsupportedUrl`
    #[default]
    TlsOnly,
    /// Accept `http://` URLs. Meant for local mock servers.
    AllowInsecureHttp,
}

/// Redirect handling for [`HyperTransport`](crate::HyperTransport)
///
/// Redirects are followed across origins by default, with credentials
/// stripped when the origin changes. HTTPS to HTTP downgrades are refused.
/// Following more than `max_redirects` hops fails the request with
/// `HttpTooManyRedirects`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Maximum hops per request (default: 10); `0` disables following
    pub max_redirects: usize,

    /// Refuse redirects to another origin unless the host is allow-listed
    pub same_origin_only: bool,

    /// Hostnames (no scheme or port) accepted when `same_origin_only` is set
    pub allowed_redirect_hosts: HashSet<String>,

    /// Drop `Authorization`, `Cookie` and `Proxy-Authorization` after a
    /// cross-origin hop
    pub strip_sensitive_headers: bool,

    pub allow_https_downgrade: bool,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            max_redirects: 10,
            same_origin_only: false,
            allowed_redirect_hosts: HashSet::new(),
            strip_sensitive_headers: true,
            allow_https_downgrade: false,
        }
    }
}

impl RedirectConfig {
    /// Return 3xx responses to the caller instead of following them
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_redirects: 0,
            ..Self::default()
        }
    }

    /// Follow same-origin redirects only
    #[must_use]
    pub fn same_origin() -> Self {
        Self {
            same_origin_only: true,
            ..Self::default()
        }
    }

    /// Permissive policy for HTTP mock servers
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            allow_https_downgrade: true,
            ..Self::default()
        }
    }
}

/// Configuration of the bundled [`HyperTransport`](crate::HyperTransport)
///
/// Deserializes from partial documents; missing fields keep their defaults
/// and durations are written as `"30s"`, `"500ms"` and so on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Time allowed for connect, redirects and the response head (default: 30s)
    ///
    /// Reading a buffered body gets a second window of the same length.
    #[serde(with = "crate::humantime_serde")]
    pub request_timeout: Duration,

    /// Largest accepted buffered response body (default: 10 MiB)
    ///
    /// Applies to decompressed bytes. Streaming responses are not limited.
    pub max_body_size: usize,

    pub user_agent: String,

    /// Default: `TlsOnly`
    pub security: TransportSecurity,

    pub tls_roots: TlsRootConfig,

    pub redirect: RedirectConfig,

    /// Idle pooled connections are closed after this long (default: 90s);
    /// `None` keeps hyper-util's default
    #[serde(with = "crate::humantime_serde::option")]
    pub pool_idle_timeout: Option<Duration>,

    /// Idle connections kept per host (default: 32)
    pub pool_max_idle_per_host: usize,

    /// Requests that may queue for the shared service (default: 1024)
    pub buffer_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            security: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::default(),
            redirect: RedirectConfig::default(),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
            buffer_capacity: 1024,
        }
    }
}

impl TransportConfig {
    /// Short timeouts, small pool and plain HTTP allowed, for mock servers
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_body_size: 1024 * 1024,
            security: TransportSecurity::AllowInsecureHttp,
            redirect: RedirectConfig::for_testing(),
            pool_idle_timeout: Some(Duration::from_secs(10)),
            pool_max_idle_per_host: 4,
            buffer_capacity: 256,
            ..Self::default()
        }
    }

    /// Accept plain `http://` URLs
    ///
    /// Only available in debug builds or with the `allow-insecure-http`
    /// feature.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        tracing::warn!(
            target: "restwire::security",
            "allow_insecure_http() called; HTTP traffic will not be encrypted"
        );
        self.security = TransportSecurity::AllowInsecureHttp;
        self
    }

    /// Day-long request timeout and no redirects, for long-lived line streams
    #[must_use]
    pub fn streaming() -> Self {
        Self {
            request_timeout: Duration::from_secs(24 * 60 * 60),
            redirect: RedirectConfig::disabled(),
            ..Self::default()
        }
    }
}
