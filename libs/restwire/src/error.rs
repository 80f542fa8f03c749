use thiserror::Error;

/// Boxed error used as the source of transport failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures observable by callers of the request executors
///
/// Transport failures and HTTP status codes are both folded into this enum,
/// so the transport's native error types never escape the executor.
/// `status_code` fields hold an HTTP status for application errors and a
/// (negative) [`TransportErrorCode`] for transport errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// No network connectivity
    #[error("No internet connection.")]
    NoConnection,

    /// Connection dropped while the request was in flight
    #[error("Connection lost during request.")]
    LostConnection,

    /// Request timed out
    #[error("Request timed out.")]
    Timeout,

    /// TLS handshake or certificate failure
    #[error("SSL error occurred.")]
    SslError,

    /// Request was cancelled before completion
    #[error("Request was cancelled.")]
    RequestCancelled,

    /// 402 and 403, 405-499 responses
    #[error("Server is unavailable. (status code {status_code})")]
    ServerUnavailable { status_code: i32 },

    /// Malformed URL, or 404 from the server
    #[error("Invalid URL. (status code {status_code})")]
    InvalidUrl { status_code: i32 },

    /// Response body could not be decoded into the expected type
    #[error("Failed to decode response. ({reason})")]
    DecodingFailed { reason: String },

    /// Request body could not be encoded
    #[error("Failed to encode request body. ({reason})")]
    EncodingFailed { reason: String },

    /// 5xx responses
    #[error("Server error occurred. (status code {status_code})")]
    ServerError { status_code: i32 },

    /// 400 response
    #[error("Bad request. (status code {status_code})")]
    BadRequest { status_code: i32 },

    /// 413 response
    #[error("Response payload too large. (status code {status_code})")]
    PayloadTooLarge { status_code: i32 },

    /// 429 response
    #[error("Too many requests. Slow down. (status code {status_code})")]
    TooManyRequests { status_code: i32 },

    /// Anything not covered by another variant
    #[error("Unknown error occurred. (status code {status_code})")]
    Unknown { status_code: i32 },

    /// 200 response with no body
    #[error("Response was empty.")]
    EmptyResponse,

    /// 401 response
    #[error("Unauthorized request. (status code {status_code})")]
    Unauthorized { status_code: i32 },

    #[error("Unsupported URL. (status code {status_code})")]
    UnsupportedUrl { status_code: i32 },

    #[error("Cannot find host. (status code {status_code})")]
    CannotFindHost { status_code: i32 },

    #[error("Cannot connect to host. (status code {status_code})")]
    CannotConnectToHost { status_code: i32 },

    #[error("DNS lookup failed. (status code {status_code})")]
    DnsLookupFailed { status_code: i32 },

    #[error("HTTP too many redirects. (status code {status_code})")]
    HttpTooManyRedirects { status_code: i32 },

    #[error("Request body stream exhausted. (status code {status_code})")]
    RequestBodyStreamExhausted { status_code: i32 },
}

impl NetworkError {
    /// Human-readable description without the status code
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::NoConnection => "No internet connection.",
            Self::LostConnection => "Connection lost during request.",
            Self::Timeout => "Request timed out.",
            Self::SslError => "SSL error occurred.",
            Self::RequestCancelled => "Request was cancelled.",
            Self::ServerUnavailable { .. } => "Server is unavailable.",
            Self::InvalidUrl { .. } => "Invalid URL.",
            Self::DecodingFailed { .. } => "Failed to decode response.",
            Self::EncodingFailed { .. } => "Failed to encode request body.",
            Self::ServerError { .. } => "Server error occurred.",
            Self::BadRequest { .. } => "Bad request.",
            Self::PayloadTooLarge { .. } => "Response payload too large.",
            Self::TooManyRequests { .. } => "Too many requests. Slow down.",
            Self::Unknown { .. } => "Unknown error occurred.",
            Self::EmptyResponse => "Response was empty.",
            Self::Unauthorized { .. } => "Unauthorized request.",
            Self::UnsupportedUrl { .. } => "Unsupported URL.",
            Self::CannotFindHost { .. } => "Cannot find host.",
            Self::CannotConnectToHost { .. } => "Cannot connect to host.",
            Self::DnsLookupFailed { .. } => "DNS lookup failed.",
            Self::HttpTooManyRedirects { .. } => "HTTP too many redirects.",
            Self::RequestBodyStreamExhausted { .. } => "Request body stream exhausted.",
        }
    }

    /// Status or transport code carried by the variant, if any
    #[must_use]
    pub fn status_code(&self) -> Option<i32> {
        match self {
            Self::ServerUnavailable { status_code }
            | Self::InvalidUrl { status_code }
            | Self::ServerError { status_code }
            | Self::BadRequest { status_code }
            | Self::PayloadTooLarge { status_code }
            | Self::TooManyRequests { status_code }
            | Self::Unknown { status_code }
            | Self::Unauthorized { status_code }
            | Self::UnsupportedUrl { status_code }
            | Self::CannotFindHost { status_code }
            | Self::CannotConnectToHost { status_code }
            | Self::DnsLookupFailed { status_code }
            | Self::HttpTooManyRedirects { status_code }
            | Self::RequestBodyStreamExhausted { status_code } => Some(*status_code),
            Self::NoConnection
            | Self::LostConnection
            | Self::Timeout
            | Self::SslError
            | Self::RequestCancelled
            | Self::DecodingFailed { .. }
            | Self::EncodingFailed { .. }
            | Self::EmptyResponse => None,
        }
    }

    /// Whether a retry may succeed where this attempt failed
    ///
    /// Connectivity blips (timeout, lost connection, no connection) are
    /// retryable. Among status errors only `ServerError` and
    /// `ServerUnavailable` carrying a 5xx status qualify.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::LostConnection | Self::NoConnection => true,
            Self::ServerError { status_code } | Self::ServerUnavailable { status_code } => {
                (500..=599).contains(status_code)
            }
            _ => false,
        }
    }

    /// Classify a non-2xx HTTP status
    ///
    /// Returns `None` for 200-299. 400, 401, 404, 413 and 429 are matched
    /// before the 402-499 bucket, which is matched before 500-599.
    #[must_use]
    pub fn from_status(status: u16) -> Option<StatusFailure> {
        let status_code = i32::from(status);
        let (message, error) = match status {
            200..=299 => return None,
            400 => ("Bad request", Self::BadRequest { status_code }),
            401 => ("Unauthorized", Self::Unauthorized { status_code }),
            404 => ("Invalid URL", Self::InvalidUrl { status_code }),
            413 => ("Payload too large", Self::PayloadTooLarge { status_code }),
            429 => ("Too many requests", Self::TooManyRequests { status_code }),
            402..=499 => ("Server unavailable", Self::ServerUnavailable { status_code }),
            500..=599 => ("Server error", Self::ServerError { status_code }),
            _ => ("Unknown error", Self::Unknown { status_code }),
        };
        Some(StatusFailure { message, error })
    }
}

/// Outcome of classifying a non-2xx status: a short log message and the error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFailure {
    pub message: &'static str,
    pub error: NetworkError,
}

/// Failure codes reported by a [`Transport`](crate::Transport)
///
/// Raw values follow the URL-loading error numbering used by most HTTP
/// stacks, so codes coming from other transports can be passed through
/// [`TransportErrorCode::from_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TransportErrorCode {
    Unknown,
    Cancelled,
    BadUrl,
    TimedOut,
    UnsupportedUrl,
    CannotFindHost,
    CannotConnectToHost,
    NetworkConnectionLost,
    DnsLookupFailed,
    HttpTooManyRedirects,
    NotConnectedToInternet,
    RequestBodyStreamExhausted,
    DataLengthExceedsMaximum,
    SecureConnectionFailed,
    /// A code this crate has no name for
    Other(i32),
}

impl TransportErrorCode {
    /// Numeric value of the code
    #[must_use]
    pub const fn raw(self) -> i32 {
        match self {
            Self::Unknown => -1,
            Self::Cancelled => -999,
            Self::BadUrl => -1000,
            Self::TimedOut => -1001,
            Self::UnsupportedUrl => -1002,
            Self::CannotFindHost => -1003,
            Self::CannotConnectToHost => -1004,
            Self::NetworkConnectionLost => -1005,
            Self::DnsLookupFailed => -1006,
            Self::HttpTooManyRedirects => -1007,
            Self::NotConnectedToInternet => -1009,
            Self::RequestBodyStreamExhausted => -1021,
            Self::DataLengthExceedsMaximum => -1103,
            Self::SecureConnectionFailed => -1200,
            Self::Other(code) => code,
        }
    }

    /// Inverse of [`raw`](Self::raw); unnamed values become `Other`
    #[must_use]
    pub const fn from_raw(code: i32) -> Self {
        match code {
            -1 => Self::Unknown,
            -999 => Self::Cancelled,
            -1000 => Self::BadUrl,
            -1001 => Self::TimedOut,
            -1002 => Self::UnsupportedUrl,
            -1003 => Self::CannotFindHost,
            -1004 => Self::CannotConnectToHost,
            -1005 => Self::NetworkConnectionLost,
            -1006 => Self::DnsLookupFailed,
            -1007 => Self::HttpTooManyRedirects,
            -1009 => Self::NotConnectedToInternet,
            -1021 => Self::RequestBodyStreamExhausted,
            -1103 => Self::DataLengthExceedsMaximum,
            -1200 => Self::SecureConnectionFailed,
            other => Self::Other(other),
        }
    }
}

/// Error reported by a transport, before mapping to [`NetworkError`]
#[derive(Error, Debug)]
#[error("transport error {code:?} ({raw})", raw = .code.raw())]
pub struct TransportError {
    pub code: TransportErrorCode,
    #[source]
    pub source: Option<BoxError>,
}

impl TransportError {
    #[must_use]
    pub fn new(code: TransportErrorCode) -> Self {
        Self { code, source: None }
    }

    /// Create an error that keeps the native failure as its source
    #[must_use]
    pub fn with_source(code: TransportErrorCode, source: impl Into<BoxError>) -> Self {
        Self {
            code,
            source: Some(source.into()),
        }
    }
}

impl From<TransportErrorCode> for NetworkError {
    fn from(code: TransportErrorCode) -> Self {
        let status_code = code.raw();
        match code {
            TransportErrorCode::Cancelled => Self::RequestCancelled,
            TransportErrorCode::BadUrl => Self::InvalidUrl { status_code },
            TransportErrorCode::TimedOut => Self::Timeout,
            TransportErrorCode::UnsupportedUrl => Self::UnsupportedUrl { status_code },
            TransportErrorCode::CannotFindHost => Self::CannotFindHost { status_code },
            TransportErrorCode::CannotConnectToHost => Self::CannotConnectToHost { status_code },
            TransportErrorCode::NetworkConnectionLost => Self::LostConnection,
            TransportErrorCode::DnsLookupFailed => Self::DnsLookupFailed { status_code },
            TransportErrorCode::HttpTooManyRedirects => Self::HttpTooManyRedirects { status_code },
            TransportErrorCode::NotConnectedToInternet => Self::NoConnection,
            TransportErrorCode::RequestBodyStreamExhausted => {
                Self::RequestBodyStreamExhausted { status_code }
            }
            TransportErrorCode::SecureConnectionFailed => Self::SslError,
            TransportErrorCode::Unknown
            | TransportErrorCode::DataLengthExceedsMaximum
            | TransportErrorCode::Other(_) => Self::Unknown { status_code },
        }
    }
}

impl From<TransportError> for NetworkError {
    fn from(err: TransportError) -> Self {
        Self::from(err.code)
    }
}

/// Reasons an [`Endpoint`](crate::Endpoint) cannot be resolved to a URI
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EndpointError {
    #[error("endpoint has no host")]
    MissingHost,

    #[error("endpoint path '{path}' must be empty or start with '/'")]
    RelativePath { path: String },

    /// Diagnostic `reason` is for logging only; its format is unstable.
    #[error("invalid URL '{url}': {reason}")]
    Malformed { url: String, reason: String },
}

impl From<EndpointError> for NetworkError {
    fn from(_: EndpointError) -> Self {
        Self::InvalidUrl {
            status_code: TransportErrorCode::BadUrl.raw(),
        }
    }
}
