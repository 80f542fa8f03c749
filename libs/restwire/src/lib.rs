#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Typed JSON-over-HTTP client layer
//!
//! This crate provides:
//! - Endpoint construction with query items and per-endpoint headers
//! - A request executor that encodes bodies, classifies HTTP statuses and
//!   transport failures into [`NetworkError`], and decodes JSON responses
//! - snake_case / camelCase key conversion in both directions
//! - A retry decorator with exponential backoff
//! - A streaming executor yielding newline-delimited lines as they arrive
//! - [`HyperTransport`], an HTTPS transport over hyper, rustls and tower
//!
//! The executors only talk to the [`Transport`] trait, so any HTTP stack can
//! be plugged in.
//!
//! # Example
//!
//! ```ignore
//! use restwire::{Api, Client, HyperTransport, RequestExecutor, Retrying};
//!
//! // The default codec rewrites snake_case wire keys to camelCase before
//! // matching fields.
//! #[derive(serde::Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct User {
//!     user_id: u64,
//!     display_name: String,
//! }
//!
//! let api = Api::new("api.example.com");
//! let client = Retrying::new(Client::new(HyperTransport::new()?));
//!
//! // {"user_id": 7, "display_name": "Ada"} on the wire
//! let user: User = client.request(&api.endpoint("/users/7")).await?;
//! ```

mod client;
mod codec;
mod config;
mod endpoint;
mod error;
pub mod humantime_serde;
mod hyper_client;
mod lines;
mod log;
mod method;
mod retry;
mod transport;
mod view_state;

#[cfg(test)]
mod test_support;

pub use client::{Client, EmptyResponse, RequestExecutor, StreamingExecutor};
pub use codec::{JsonCodec, KeyDecodingStrategy, KeyEncodingStrategy, to_camel_case, to_snake_case};
pub use config::{
    DEFAULT_MAX_BODY_SIZE, DEFAULT_USER_AGENT, RedirectConfig, TlsRootConfig, TransportConfig,
    TransportSecurity,
};
pub use endpoint::{Api, DEFAULT_SCHEME, Endpoint, QueryItem, default_headers};
pub use error::{
    BoxError, EndpointError, NetworkError, StatusFailure, TransportError, TransportErrorCode,
};
pub use hyper_client::{HyperTransport, RedirectLimitExceeded, RedirectPolicy, TransportBuildError};
pub use lines::LineStream;
pub use log::{LogCategory, LogLevel, NetworkLog, TracingLog};
pub use method::HttpMethod;
pub use retry::{ExponentialBackoff, RetryConfig, Retrying, calculate_backoff};
pub use transport::{
    ByteStream, ResponseHead, StreamingResponse, Transport, TransportRequest, TransportResponse,
};
pub use view_state::ViewState;
