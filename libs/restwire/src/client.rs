use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use serde::de::value::UnitDeserializer;
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Serialize};

use crate::codec::JsonCodec;
use crate::endpoint::Endpoint;
use crate::error::{NetworkError, StatusFailure, TransportErrorCode};
use crate::lines::LineStream;
use crate::log::{LogCategory, LogLevel, NetworkLog};
use crate::method::HttpMethod;
use crate::transport::{ResponseHead, Transport, TransportRequest};

/// Response type for endpoints that answer `204 No Content`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResponse;

/// Executes requests and decodes JSON responses
///
/// Implemented by [`Client`] and by decorators such as
/// [`Retrying`](crate::Retrying).
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Send `body` (if any) to `endpoint` with `method` and decode the response
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] for transport failures, non-2xx statuses,
    /// empty `200` bodies and bodies that do not decode into `T`.
    async fn perform_request<T, B>(
        &self,
        endpoint: &Endpoint,
        method: HttpMethod,
        body: Option<&B>,
    ) -> Result<T, NetworkError>
    where
        T: DeserializeOwned + Send,
        B: Serialize + Sync + ?Sized;

    /// `GET` without a body
    ///
    /// # Errors
    ///
    /// Same as [`perform_request`](Self::perform_request).
    async fn request<T>(&self, endpoint: &Endpoint) -> Result<T, NetworkError>
    where
        T: DeserializeOwned + Send,
    {
        self.perform_request(endpoint, HttpMethod::Get, None::<&()>)
            .await
    }

    /// # Errors
    ///
    /// Same as [`perform_request`](Self::perform_request).
    async fn request_with<T, B>(
        &self,
        endpoint: &Endpoint,
        method: HttpMethod,
        body: Option<&B>,
    ) -> Result<T, NetworkError>
    where
        T: DeserializeOwned + Send,
        B: Serialize + Sync + ?Sized,
    {
        self.perform_request(endpoint, method, body).await
    }
}

/// Executes requests whose response body is consumed line by line
#[async_trait]
pub trait StreamingExecutor: Send + Sync {
    /// Send `body` and return the response body as a [`LineStream`]
    ///
    /// The status is checked before the stream is returned, so a non-2xx
    /// response fails here and never produces a line.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] for transport failures and non-2xx statuses.
    async fn perform_streaming_request<B>(
        &self,
        endpoint: &Endpoint,
        method: HttpMethod,
        body: &B,
    ) -> Result<LineStream, NetworkError>
    where
        B: Serialize + Sync + ?Sized;

    /// `POST` streaming request
    ///
    /// # Errors
    ///
    /// Same as [`perform_streaming_request`](Self::perform_streaming_request).
    async fn streaming_request<B>(
        &self,
        endpoint: &Endpoint,
        body: &B,
    ) -> Result<LineStream, NetworkError>
    where
        B: Serialize + Sync + ?Sized,
    {
        self.perform_streaming_request(endpoint, HttpMethod::Post, body)
            .await
    }
}

/// Response body after status validation
enum Payload {
    /// `204` with an empty body
    NoContent,
    Content(Bytes),
}

/// Request executor over a [`Transport`]
///
/// Holds the transport, a shared [`JsonCodec`] and an optional
/// [`NetworkLog`]. `Client` has no interior mutability, so one instance can
/// serve any number of concurrent calls.
///
/// # Example
///
/// ```ignore
/// use restwire::{Api, Client, HyperTransport, RequestExecutor};
///
/// let client = Client::new(HyperTransport::new()?);
/// let api = Api::new("api.example.com");
/// let user: User = client.request(&api.endpoint("/users/1")).await?;
/// ```
#[derive(Clone)]
pub struct Client<T> {
    transport: T,
    codec: Arc<JsonCodec>,
    log: Option<Arc<dyn NetworkLog>>,
}

impl<T: Transport> Client<T> {
    /// Client with the default codec and no logger
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            codec: Arc::new(JsonCodec::default()),
            log: None,
        }
    }

    #[must_use]
    pub fn with_codec(mut self, codec: impl Into<Arc<JsonCodec>>) -> Self {
        self.codec = codec.into();
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn NetworkLog>) -> Self {
        self.log = Some(log);
        self
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn codec(&self) -> &JsonCodec {
        &self.codec
    }

    fn encode<B>(&self, body: &B) -> Result<Bytes, NetworkError>
    where
        B: Serialize + ?Sized,
    {
        self.codec
            .encode(body)
            .map_err(|e| NetworkError::EncodingFailed {
                reason: e.to_string(),
            })
    }

    fn build_request(
        uri: http::Uri,
        endpoint: &Endpoint,
        method: HttpMethod,
        body: Bytes,
    ) -> Result<TransportRequest, NetworkError> {
        let mut request = http::Request::new(body);
        *request.method_mut() = method.into();
        *request.uri_mut() = uri;

        let headers = request.headers_mut();
        for (name, value) in endpoint.headers() {
            let invalid = |reason: String| NetworkError::EncodingFailed {
                reason: format!("header '{name}': {reason}"),
            };
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            headers.insert(name, value);
        }

        Ok(request)
    }

    fn log_request(&self, request: &TransportRequest) {
        if let Some(log) = &self.log {
            log.log_request(request);
        }
    }

    fn log_response(&self, head: &ResponseHead, body: Option<&[u8]>) {
        if let Some(log) = &self.log {
            log.log_response(head, body);
        }
    }

    /// Fail on a missing or non-2xx status, logging the classified failure
    fn check_status(&self, head: &ResponseHead) -> Result<StatusCode, NetworkError> {
        let Some(status) = head.status else {
            return Err(NetworkError::Unknown {
                status_code: TransportErrorCode::Unknown.raw(),
            });
        };

        match NetworkError::from_status(status.as_u16()) {
            None => Ok(status),
            Some(StatusFailure { message, error }) => {
                if let Some(log) = &self.log {
                    let text = format!(
                        "{message}. {}. Status Code: {}",
                        head.url,
                        status.as_u16()
                    );
                    log.log(LogLevel::Error, LogCategory::Networking, &text);
                }
                Err(error)
            }
        }
    }

    async fn execute(&self, request: TransportRequest) -> Result<Payload, NetworkError> {
        self.log_request(&request);
        let response = self.transport.send(request).await?;
        self.log_response(&response.head, Some(&response.body));

        let status = self.check_status(&response.head)?;
        if response.body.is_empty() {
            if status == StatusCode::NO_CONTENT {
                return Ok(Payload::NoContent);
            }
            if status == StatusCode::OK {
                return Err(NetworkError::EmptyResponse);
            }
        }
        Ok(Payload::Content(response.body))
    }

    fn decode<R: DeserializeOwned>(&self, payload: Payload) -> Result<R, NetworkError> {
        match payload {
            // Only unit-like targets (EmptyResponse, (), Option<_>) accept this.
            Payload::NoContent => {
                let unit: UnitDeserializer<serde::de::value::Error> = ().into_deserializer();
                R::deserialize(unit).map_err(|_| NetworkError::EmptyResponse)
            }
            Payload::Content(bytes) => {
                self.codec
                    .decode(&bytes)
                    .map_err(|e| NetworkError::DecodingFailed {
                        reason: e.to_string(),
                    })
            }
        }
    }
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("codec", &self.codec)
            .field("has_log", &self.log.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<Tr: Transport> RequestExecutor for Client<Tr> {
    async fn perform_request<T, B>(
        &self,
        endpoint: &Endpoint,
        method: HttpMethod,
        body: Option<&B>,
    ) -> Result<T, NetworkError>
    where
        T: DeserializeOwned + Send,
        B: Serialize + Sync + ?Sized,
    {
        let uri = endpoint.url()?;
        let body = match body {
            Some(body) => self.encode(body)?,
            None => Bytes::new(),
        };
        let request = Self::build_request(uri, endpoint, method, body)?;

        let payload = self.execute(request).await?;
        self.decode(payload)
    }
}

#[async_trait]
impl<Tr: Transport> StreamingExecutor for Client<Tr> {
    async fn perform_streaming_request<B>(
        &self,
        endpoint: &Endpoint,
        method: HttpMethod,
        body: &B,
    ) -> Result<LineStream, NetworkError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let uri = endpoint.url()?;
        let body = self.encode(body)?;
        let request = Self::build_request(uri, endpoint, method, body)?;

        self.log_request(&request);
        let response = self.transport.send_streaming(request).await?;
        self.log_response(&response.head, None);
        self.check_status(&response.head)?;

        Ok(LineStream::new(response.body))
    }
}
