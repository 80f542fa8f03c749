//! Bundled [`Transport`] built on hyper, rustls and tower.
//!
//! Request flow (outer to inner):
//!   Buffer -> error mapping -> Timeout -> Decompression -> FollowRedirect -> hyper client
//!
//! Any HTTP status counts as a response here; status classification happens
//! in [`Client`](crate::Client). Failures are reported as [`TransportError`]
//! with the native error kept as the source.

mod redirect;
mod tls;

pub use redirect::{RedirectLimitExceeded, RedirectPolicy};

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use http::header::{self, HeaderValue, InvalidHeaderValue};
use http::{Request, Response};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use thiserror::Error;
use tower::buffer::Buffer;
use tower::timeout::TimeoutLayer;
use tower::timeout::error::Elapsed;
use tower::util::BoxCloneService;
use tower::{Service, ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;
use tower_http::follow_redirect::{FollowRedirectLayer, RequestUri};

use crate::config::{TransportConfig, TransportSecurity};
use crate::error::{BoxError, TransportError, TransportErrorCode};
use crate::transport::{
    ByteStream, ResponseHead, StreamingResponse, Transport, TransportRequest, TransportResponse,
};

/// Decompressed response body
type ResponseBody = BoxBody<Bytes, BoxError>;

type ServiceFuture = std::pin::Pin<
    Box<dyn Future<Output = Result<Response<ResponseBody>, TransportError>> + Send + 'static>,
>;

type InnerService = BoxCloneService<Request<Full<Bytes>>, Response<ResponseBody>, TransportError>;

type BufferedService = Buffer<Request<Full<Bytes>>, ServiceFuture>;

/// Failure to construct a [`HyperTransport`]
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportBuildError {
    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("invalid user agent: {0}")]
    InvalidUserAgent(#[from] InvalidHeaderValue),
}

/// HTTPS transport with connection pooling, redirects and transparent
/// decompression
///
/// Clones share one connection pool through a buffered service, so clone
/// freely. Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct HyperTransport {
    service: BufferedService,
    user_agent: HeaderValue,
    request_timeout: Duration,
    max_body_size: usize,
    security: TransportSecurity,
}

impl fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransport")
            .field("user_agent", &self.user_agent)
            .field("request_timeout", &self.request_timeout)
            .field("max_body_size", &self.max_body_size)
            .field("security", &self.security)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// Transport with [`TransportConfig::default`]
    ///
    /// # Errors
    ///
    /// Returns an error if TLS initialization fails.
    pub fn new() -> Result<Self, TransportBuildError> {
        Self::with_config(TransportConfig::default())
    }

    /// # Errors
    ///
    /// Returns an error if TLS initialization fails or the configured user
    /// agent is not a valid header value.
    pub fn with_config(config: TransportConfig) -> Result<Self, TransportBuildError> {
        let user_agent = HeaderValue::from_str(&config.user_agent)?;
        let https = tls::https_connector(config.tls_roots, config.security)?;

        // pool_idle_timeout has no effect without pool_timer
        let mut builder = Client::builder(TokioExecutor::new());
        builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .http2_only(false);
        if let Some(idle) = config.pool_idle_timeout {
            builder.pool_idle_timeout(idle);
        }
        let hyper_client = builder.build::<_, Full<Bytes>>(https).map_err(box_client_error);

        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(config.request_timeout))
            .layer(DecompressionLayer::new())
            .layer(FollowRedirectLayer::with_policy(RedirectPolicy::new(
                config.redirect,
            )))
            .service(hyper_client)
            .map_response(box_response_body)
            .map_err(map_error);

        let service: InnerService = service.boxed_clone();

        Ok(Self {
            service: Buffer::new(service, config.buffer_capacity.max(1)),
            user_agent,
            request_timeout: config.request_timeout,
            max_body_size: config.max_body_size,
            security: config.security,
        })
    }

    /// Reject URLs this transport will not send, and fill in the User-Agent
    fn prepare(&self, request: TransportRequest) -> Result<Request<Full<Bytes>>, TransportError> {
        let uri = request.uri();
        if uri.host().is_none() {
            return Err(TransportError::new(TransportErrorCode::BadUrl));
        }
        let plain_allowed = self.security == TransportSecurity::AllowInsecureHttp;
        match uri.scheme_str() {
            Some("https") => {}
            Some("http") if plain_allowed => {}
            _ => {
                tracing::debug!(uri = %uri, "refusing unsupported URL scheme");
                return Err(TransportError::new(TransportErrorCode::UnsupportedUrl));
            }
        }

        let (mut parts, body) = request.into_parts();
        parts
            .headers
            .entry(header::USER_AGENT)
            .or_insert_with(|| self.user_agent.clone());
        Ok(Request::from_parts(parts, Full::new(body)))
    }

    /// Owns a clone of the service handle, not a borrow of `self`
    fn dispatch(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<(ResponseHead, ResponseBody), TransportError>> + Send + 'static
    {
        let prepared = self.prepare(request);
        let mut service = self.service.clone();
        async move {
            let request = prepared?;
            let requested = request.uri().to_string();

            service.ready().await.map_err(from_buffer_error)?;
            let response = service.call(request).await.map_err(from_buffer_error)?;

            let url = response
                .extensions()
                .get::<RequestUri>()
                .map_or(requested, |RequestUri(uri)| uri.to_string());
            let (parts, body) = response.into_parts();
            let head = ResponseHead {
                url,
                status: Some(parts.status),
                headers: parts.headers,
            };
            Ok((head, body))
        }
    }
}

#[async_trait]
impl Transport for HyperTransport {
    /// The body read gets its own `request_timeout` window after the head
    /// arrives.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let (head, body) = self.dispatch(request).await?;
        let body = tokio::time::timeout(
            self.request_timeout,
            read_body_limited(body, self.max_body_size),
        )
        .await
        .map_err(|elapsed| TransportError::with_source(TransportErrorCode::TimedOut, elapsed))??;
        Ok(TransportResponse { head, body })
    }

    async fn send_streaming(
        &self,
        request: TransportRequest,
    ) -> Result<StreamingResponse, TransportError> {
        let (head, body) = self.dispatch(request).await?;
        let body: ByteStream = Box::pin(body.into_data_stream().map_err(map_error));
        Ok(StreamingResponse { head, body })
    }
}

async fn read_body_limited(mut body: ResponseBody, limit: usize) -> Result<Bytes, TransportError> {
    let mut buf = BytesMut::new();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(map_error)?;
        // Trailers are ignored
        if let Ok(chunk) = frame.into_data() {
            if chunk.len() > limit - buf.len() {
                tracing::debug!(limit, "response body exceeds the size limit");
                return Err(TransportError::new(
                    TransportErrorCode::DataLengthExceedsMaximum,
                ));
            }
            buf.extend_from_slice(&chunk);
        }
    }
    Ok(buf.freeze())
}

fn box_client_error(err: hyper_util::client::legacy::Error) -> BoxError {
    Box::new(err)
}

fn box_response_body<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: http_body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxError>,
{
    response.map(|body| body.map_err(Into::into).boxed())
}

/// Unwrap the inner service's error; anything else means the buffer worker
/// is gone.
fn from_buffer_error(err: BoxError) -> TransportError {
    match err.downcast::<TransportError>() {
        Ok(err) => *err,
        Err(err) => {
            tracing::error!(error = %err, "transport buffer closed unexpectedly");
            TransportError::with_source(TransportErrorCode::Unknown, err)
        }
    }
}

fn map_error(err: BoxError) -> TransportError {
    TransportError::with_source(classify_error(&*err), err)
}

/// Walk the source chain for the most specific failure
fn classify_error(err: &(dyn StdError + 'static)) -> TransportErrorCode {
    let mut connect_failed = false;
    let mut next = Some(err);

    while let Some(err) = next {
        if err.is::<Elapsed>() {
            return TransportErrorCode::TimedOut;
        }
        if err.is::<RedirectLimitExceeded>() {
            return TransportErrorCode::HttpTooManyRedirects;
        }
        if err.is::<rustls::Error>() {
            return TransportErrorCode::SecureConnectionFailed;
        }
        if let Some(err) = err.downcast_ref::<TransportError>() {
            return err.code;
        }
        if let Some(err) = err.downcast_ref::<hyper_util::client::legacy::Error>() {
            connect_failed |= err.is_connect();
        }
        if let Some(err) = err.downcast_ref::<hyper::Error>() {
            if err.is_timeout() {
                return TransportErrorCode::TimedOut;
            }
            if err.is_canceled() {
                return TransportErrorCode::Cancelled;
            }
            if err.is_incomplete_message() || err.is_closed() {
                return TransportErrorCode::NetworkConnectionLost;
            }
        }
        if let Some(err) = err.downcast_ref::<io::Error>() {
            if let Some(code) = classify_io(err.kind()) {
                return code;
            }
            // io::Error::source skips the wrapped error itself
            if let Some(inner) = err.get_ref() {
                next = Some(inner as &(dyn StdError + 'static));
                continue;
            }
        }

        // hyper-util's connector errors are private types
        let message = err.to_string();
        if message.starts_with("dns error") {
            return TransportErrorCode::CannotFindHost;
        }
        if message.contains("failed to lookup address") {
            return TransportErrorCode::DnsLookupFailed;
        }

        next = err.source();
    }

    if connect_failed {
        TransportErrorCode::CannotConnectToHost
    } else {
        TransportErrorCode::Unknown
    }
}

fn classify_io(kind: io::ErrorKind) -> Option<TransportErrorCode> {
    use io::ErrorKind;

    match kind {
        ErrorKind::ConnectionRefused => Some(TransportErrorCode::CannotConnectToHost),
        ErrorKind::TimedOut => Some(TransportErrorCode::TimedOut),
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::UnexpectedEof => Some(TransportErrorCode::NetworkConnectionLost),
        ErrorKind::NetworkUnreachable | ErrorKind::HostUnreachable | ErrorKind::NetworkDown => {
            Some(TransportErrorCode::NotConnectedToInternet)
        }
        _ => None,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::RedirectConfig;
    use futures::StreamExt;
    use http::{Method, StatusCode};
    use httpmock::prelude::*;

    fn transport(config: TransportConfig) -> HyperTransport {
        HyperTransport::with_config(config).unwrap()
    }

    fn get(url: &str) -> TransportRequest {
        Request::builder().uri(url).body(Bytes::new()).unwrap()
    }

    #[tokio::test]
    async fn test_buffered_response() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/users/1");
            then.status(200).body(r#"{"id":1}"#);
        });

        let response = transport(TransportConfig::for_testing())
            .send(get(&server.url("/users/1")))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(response.head.status, Some(StatusCode::OK));
        assert_eq!(response.head.url, server.url("/users/1"));
        assert_eq!(&response.body[..], br#"{"id":1}"#);
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.path("/missing");
            then.status(404).body("nope");
        });

        let response = transport(TransportConfig::for_testing())
            .send(get(&server.url("/missing")))
            .await
            .unwrap();
        assert_eq!(response.head.status, Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_default_user_agent_and_caller_override() {
        let server = MockServer::start();
        let default_ua = server.mock(|when, then| {
            when.path("/ua").header("user-agent", crate::config::DEFAULT_USER_AGENT);
            then.status(200);
        });
        let custom_ua = server.mock(|when, then| {
            when.path("/ua").header("user-agent", "custom-agent/2.0");
            then.status(200);
        });
        let transport = transport(TransportConfig::for_testing());

        transport.send(get(&server.url("/ua"))).await.unwrap();
        let mut request = get(&server.url("/ua"));
        request
            .headers_mut()
            .insert(header::USER_AGENT, HeaderValue::from_static("custom-agent/2.0"));
        transport.send(request).await.unwrap();

        default_ua.assert();
        custom_ua.assert();
    }

    #[tokio::test]
    async fn test_posts_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/items").body(r#"{"name":"a"}"#);
            then.status(201);
        });

        let request = Request::builder()
            .method(Method::POST)
            .uri(server.url("/items"))
            .body(Bytes::from_static(br#"{"name":"a"}"#))
            .unwrap();
        let response = transport(TransportConfig::for_testing())
            .send(request)
            .await
            .unwrap();

        mock.assert();
        assert_eq!(response.head.status, Some(StatusCode::CREATED));
    }

    #[tokio::test]
    async fn test_plain_http_refused_by_default() {
        let err = HyperTransport::new()
            .unwrap()
            .send(get("http://127.0.0.1:9/"))
            .await
            .unwrap_err();
        assert_eq!(err.code, TransportErrorCode::UnsupportedUrl);
    }

    #[tokio::test]
    async fn test_other_schemes_refused() {
        let transport = transport(TransportConfig::for_testing());
        let err = transport.send(get("ftp://example.com/file")).await.unwrap_err();
        assert_eq!(err.code, TransportErrorCode::UnsupportedUrl);

        let err = transport.send(get("/relative")).await.unwrap_err();
        assert_eq!(err.code, TransportErrorCode::BadUrl);
    }

    #[tokio::test]
    async fn test_body_over_limit() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.path("/large");
            then.status(200).body("x".repeat(64));
        });

        let err = transport(TransportConfig {
            max_body_size: 16,
            ..TransportConfig::for_testing()
        })
        .send(get(&server.url("/large")))
        .await
        .unwrap_err();
        assert_eq!(err.code, TransportErrorCode::DataLengthExceedsMaximum);
    }

    #[tokio::test]
    async fn test_follows_redirect_and_reports_final_url() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.path("/old");
            then.status(301).header("location", "/new");
        });
        server.mock(|when, then| {
            when.path("/new");
            then.status(200).body("moved");
        });

        let response = transport(TransportConfig::for_testing())
            .send(get(&server.url("/old")))
            .await
            .unwrap();
        assert_eq!(response.head.status, Some(StatusCode::OK));
        assert_eq!(response.head.url, server.url("/new"));
    }

    #[tokio::test]
    async fn test_redirect_loop_hits_limit() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.path("/loop");
            then.status(302).header("location", "/loop");
        });

        let err = transport(TransportConfig {
            redirect: RedirectConfig {
                max_redirects: 2,
                ..RedirectConfig::for_testing()
            },
            ..TransportConfig::for_testing()
        })
        .send(get(&server.url("/loop")))
        .await
        .unwrap_err();

        assert_eq!(err.code, TransportErrorCode::HttpTooManyRedirects);
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_disabled_redirects_return_3xx() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.path("/old");
            then.status(302).header("location", "/new");
        });

        let response = transport(TransportConfig {
            redirect: RedirectConfig::disabled(),
            ..TransportConfig::for_testing()
        })
        .send(get(&server.url("/old")))
        .await
        .unwrap();
        assert_eq!(response.head.status, Some(StatusCode::FOUND));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = transport(TransportConfig::for_testing())
            .send(get(&format!("http://127.0.0.1:{port}/")))
            .await
            .unwrap_err();
        assert_eq!(err.code, TransportErrorCode::CannotConnectToHost);
        assert!(err.source.is_some());
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.path("/slow");
            then.status(200).delay(Duration::from_millis(500));
        });

        let err = transport(TransportConfig {
            request_timeout: Duration::from_millis(50),
            ..TransportConfig::for_testing()
        })
        .send(get(&server.url("/slow")))
        .await
        .unwrap_err();
        assert_eq!(err.code, TransportErrorCode::TimedOut);
    }

    #[tokio::test]
    async fn test_streaming_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/events");
            then.status(200).body("data: 1\ndata: 2\n");
        });

        let request = Request::builder()
            .method(Method::POST)
            .uri(server.url("/events"))
            .body(Bytes::from_static(b"{}"))
            .unwrap();
        let response = transport(TransportConfig::for_testing())
            .send_streaming(request)
            .await
            .unwrap();
        assert_eq!(response.head.status, Some(StatusCode::OK));

        let chunks: Vec<Bytes> = response
            .body
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.concat(), b"data: 1\ndata: 2\n");
    }

    #[test]
    fn test_classify_io_kinds() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(
            classify_error(&refused),
            TransportErrorCode::CannotConnectToHost
        );

        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        assert_eq!(
            classify_error(&reset),
            TransportErrorCode::NetworkConnectionLost
        );
    }

    #[test]
    fn test_classify_sees_through_io_wrapping() {
        let tls = io::Error::new(
            io::ErrorKind::InvalidData,
            rustls::Error::General("bad certificate".to_owned()),
        );
        assert_eq!(
            classify_error(&tls),
            TransportErrorCode::SecureConnectionFailed
        );

        let nested = TransportError::with_source(
            TransportErrorCode::Unknown,
            RedirectLimitExceeded { limit: 1 },
        );
        assert_eq!(
            classify_error(&nested),
            TransportErrorCode::Unknown,
            "an explicit code wins over its source"
        );
    }

    #[test]
    fn test_unrecognized_errors_are_unknown() {
        let err = io::Error::other("something odd");
        assert_eq!(classify_error(&err), TransportErrorCode::Unknown);
    }
}
