//! Redirect policy for [`HyperTransport`](super::HyperTransport)
//!
//! Hops are counted per request. Going past the configured limit fails the
//! request with [`RedirectLimitExceeded`], which the transport reports as
//! `HttpTooManyRedirects`. Refused hops (HTTPS downgrade, blocked origin)
//! stop following and hand the 3xx response back to the caller.

use http::{Request, Uri, header};
use thiserror::Error;
use tower_http::follow_redirect::policy::{Action, Attempt, Policy};

use crate::config::RedirectConfig;

const CREDENTIAL_HEADERS: [header::HeaderName; 3] = [
    header::AUTHORIZATION,
    header::COOKIE,
    header::PROXY_AUTHORIZATION,
];

/// A redirect chain went past [`RedirectConfig::max_redirects`]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("followed more than {limit} redirects")]
pub struct RedirectLimitExceeded {
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    config: RedirectConfig,
    hops: usize,
    crossed_origin: bool,
}

impl RedirectPolicy {
    #[must_use]
    pub fn new(config: RedirectConfig) -> Self {
        Self {
            config,
            hops: 0,
            crossed_origin: false,
        }
    }

    fn host_allowed(&self, target: &Uri) -> bool {
        target
            .host()
            .is_some_and(|host| self.config.allowed_redirect_hosts.contains(host))
    }
}

/// Scheme, host and effective port match. A missing scheme counts as https.
fn same_origin(from: &Uri, to: &Uri) -> bool {
    let from_scheme = from.scheme_str().unwrap_or("https");
    let to_scheme = to.scheme_str().unwrap_or("https");

    from_scheme == to_scheme
        && from.host() == to.host()
        && effective_port(from, from_scheme) == effective_port(to, to_scheme)
}

fn effective_port(uri: &Uri, scheme: &str) -> u16 {
    uri.port_u16().unwrap_or(match scheme {
        "http" => 80,
        "https" => 443,
        _ => 0,
    })
}

fn is_downgrade(from: &Uri, to: &Uri) -> bool {
    from.scheme_str().unwrap_or("https") == "https" && to.scheme_str() == Some("http")
}

impl<B: Clone, E: From<RedirectLimitExceeded>> Policy<B, E> for RedirectPolicy {
    fn redirect(&mut self, attempt: &Attempt<'_>) -> Result<Action, E> {
        let limit = self.config.max_redirects;
        if limit == 0 {
            return Ok(Action::Stop);
        }

        self.hops += 1;
        if self.hops > limit {
            tracing::debug!(hops = self.hops, limit, "redirect limit exceeded");
            return Err(E::from(RedirectLimitExceeded { limit }));
        }

        let from = attempt.previous();
        let to = attempt.location();

        if !self.config.allow_https_downgrade && is_downgrade(from, to) {
            tracing::warn!(from = %from, to = %to, "refusing https to http redirect");
            return Ok(Action::Stop);
        }

        let same = same_origin(from, to);
        if self.config.same_origin_only && !same && !self.host_allowed(to) {
            tracing::warn!(from = %from, to = %to, "refusing cross-origin redirect");
            return Ok(Action::Stop);
        }

        if !same {
            self.crossed_origin = true;
        }
        tracing::debug!(hop = self.hops, to = %to, "following redirect");
        Ok(Action::Follow)
    }

    fn on_request(&mut self, request: &mut Request<B>) {
        if !(self.crossed_origin && self.config.strip_sensitive_headers) {
            return;
        }
        let headers = request.headers_mut();
        for name in &CREDENTIAL_HEADERS {
            if headers.remove(name).is_some() {
                tracing::debug!(header = %name, "dropped credential header after origin change");
            }
        }
    }

    // 307 and 308 replay the original body
    fn clone_body(&self, body: &B) -> Option<B> {
        Some(body.clone())
    }
}
