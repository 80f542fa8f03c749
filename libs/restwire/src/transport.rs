//! Transport collaborator.
//!
//! The executors never open connections themselves. They hand a fully built
//! [`TransportRequest`] to a [`Transport`] and receive either the whole body
//! or a byte stream back. [`HyperTransport`](crate::HyperTransport) is the
//! bundled implementation; tests substitute an in-memory one.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::error::TransportError;

/// Request handed to a transport: resolved URI, method, headers and encoded body
pub type TransportRequest = http::Request<Bytes>;

/// Response body delivered incrementally by [`Transport::send_streaming`]
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<Bytes, TransportError>> + Send + 'static>>;

/// Response metadata shared by buffered and streaming responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// Final URL of the response (after redirects)
    pub url: String,
    /// HTTP status, `None` when the transport produced a non-HTTP response
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// Head of an HTTP response with no headers
    #[must_use]
    pub fn new(url: impl Into<String>, status: StatusCode) -> Self {
        Self {
            url: url.into(),
            status: Some(status),
            headers: HeaderMap::new(),
        }
    }
}

/// Buffered response: head plus the complete body
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub head: ResponseHead,
    pub body: Bytes,
}

/// Streaming response: head plus a body that has not been read yet
pub struct StreamingResponse {
    pub head: ResponseHead,
    pub body: ByteStream,
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

/// Sends requests on behalf of a [`Client`](crate::Client)
///
/// Implementations own connection management, TLS and redirects. Failures
/// must be reported as [`TransportError`] so the client can classify them;
/// non-2xx statuses are not failures at this level.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and read the whole response body
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;

    /// Send a request and return as soon as the response head is available
    ///
    /// Dropping the returned body stream must abandon the read.
    async fn send_streaming(
        &self,
        request: TransportRequest,
    ) -> Result<StreamingResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        (**self).send(request).await
    }

    async fn send_streaming(
        &self,
        request: TransportRequest,
    ) -> Result<StreamingResponse, TransportError> {
        (**self).send_streaming(request).await
    }
}
