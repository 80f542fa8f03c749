//! Request targets.
//!
//! An [`Endpoint`] is plain data: scheme, host, path, ordered query items and
//! headers. It is resolved to an [`http::Uri`] only when a request is built.
//! [`Api`] is a small factory for endpoints that share a scheme and host.

use std::collections::BTreeMap;

use crate::error::EndpointError;

/// Default URL scheme for endpoints
pub const DEFAULT_SCHEME: &str = "https";

/// Headers attached to every endpoint unless the caller provides its own set
#[must_use]
pub fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([("Content-Type".to_owned(), "application/json".to_owned())])
}

/// A single query parameter
///
/// A `None` value renders as the bare name (`?verbose`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryItem {
    pub name: String,
    pub value: Option<String>,
}

impl QueryItem {
    /// Create a `name=value` query item
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Create a query item without a value
    #[must_use]
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

/// Description of a request target
///
/// Endpoints are immutable; the `with_*` methods return modified copies.
///
/// # Example
///
/// ```ignore
/// use restwire::{Endpoint, QueryItem};
///
/// let endpoint = Endpoint::new("api.example.com", "/v1/users")
///     .with_query_items(vec![QueryItem::new("page", "2")]);
/// assert_eq!(endpoint.url()?.to_string(), "https://api.example.com/v1/users?page=2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: String,
    host: String,
    path: String,
    query_items: Vec<QueryItem>,
    headers: BTreeMap<String, String>,
}

impl Endpoint {
    /// Create an endpoint with the default scheme, no query items and the
    /// default JSON content-type header
    ///
    /// `host` may carry an explicit port (`"localhost:8080"`).
    #[must_use]
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_owned(),
            host: host.into(),
            path: path.into(),
            query_items: Vec::new(),
            headers: default_headers(),
        }
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query_items(&self) -> &[QueryItem] {
        &self.query_items
    }

    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Copy of this endpoint with a different scheme
    #[must_use]
    pub fn with_scheme(&self, scheme: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.scheme = scheme.into();
        copy
    }

    /// Copy of this endpoint with its query items replaced
    #[must_use]
    pub fn with_query_items(&self, query_items: Vec<QueryItem>) -> Self {
        let mut copy = self.clone();
        copy.query_items = query_items;
        copy
    }

    /// Copy of this endpoint with its header map replaced
    #[must_use]
    pub fn with_headers(&self, headers: BTreeMap<String, String>) -> Self {
        let mut copy = self.clone();
        copy.headers = headers;
        copy
    }

    /// Copy of this endpoint with one header inserted (or overwritten)
    #[must_use]
    pub fn with_header(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.headers.insert(name.into(), value.into());
        copy
    }

    /// Resolve the endpoint to an absolute URI
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] if the host is empty or carries a path, query
    /// or fragment, if a non-empty path does not start with `/`, or if the
    /// assembled URL is not a valid URI.
    pub fn url(&self) -> Result<http::Uri, EndpointError> {
        if self.host.is_empty() {
            return Err(EndpointError::MissingHost);
        }
        if self.host.contains(['/', '?', '#']) {
            return Err(EndpointError::Malformed {
                url: format!("{}://{}", self.scheme, self.host),
                reason: "host must not contain '/', '?' or '#'".to_owned(),
            });
        }
        if !self.path.is_empty() && !self.path.starts_with('/') {
            return Err(EndpointError::RelativePath {
                path: self.path.clone(),
            });
        }

        let base = format!("{}://{}", self.scheme, self.host);
        let mut url = url::Url::parse(&base).map_err(|e| EndpointError::Malformed {
            url: base.clone(),
            reason: e.to_string(),
        })?;
        url.set_path(&self.path);

        if !self.query_items.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for item in &self.query_items {
                match &item.value {
                    Some(value) => pairs.append_pair(&item.name, value),
                    None => pairs.append_key_only(&item.name),
                };
            }
        }

        url.as_str()
            .parse::<http::Uri>()
            .map_err(|e| EndpointError::Malformed {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Factory for endpoints sharing a scheme and host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Api {
    scheme: String,
    host: String,
}

impl Api {
    /// Create an API description with the default `https` scheme
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_owned(),
            host: host.into(),
        }
    }

    /// Use a different scheme for every endpoint produced by this API
    #[must_use]
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Endpoint for `path` with no query items and the default headers
    #[must_use]
    pub fn endpoint(&self, path: impl Into<String>) -> Endpoint {
        Endpoint::new(self.host.clone(), path).with_scheme(self.scheme.clone())
    }

    /// Endpoint for `path` with explicit query items and headers
    #[must_use]
    pub fn endpoint_with(
        &self,
        path: impl Into<String>,
        query_items: Vec<QueryItem>,
        headers: BTreeMap<String, String>,
    ) -> Endpoint {
        Endpoint {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            path: path.into(),
            query_items,
            headers,
        }
    }
}
