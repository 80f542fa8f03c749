//! Logging collaborator used by the executors.
//!
//! A [`Client`](crate::Client) logs outgoing requests, responses and status
//! failures through an optional [`NetworkLog`]. No logger means no logging;
//! control flow is the same either way. [`TracingLog`] forwards everything to
//! `tracing`.

use std::fmt;

use crate::transport::{ResponseHead, TransportRequest};

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Subsystem a log entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    Networking,
    Streaming,
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Networking => "networking",
            Self::Streaming => "streaming",
        })
    }
}

/// Sink for executor log messages
pub trait NetworkLog: Send + Sync {
    fn log(&self, level: LogLevel, category: LogCategory, message: &str);

    /// Called before a request is handed to the transport
    fn log_request(&self, request: &TransportRequest) {
        let message = format!(
            "--> {} {} ({} bytes)",
            request.method(),
            request.uri(),
            request.body().len()
        );
        self.log(LogLevel::Debug, LogCategory::Networking, &message);
    }

    /// Called once the response head is known
    ///
    /// `body` is `None` for streaming responses, whose body has not been read.
    fn log_response(&self, head: &ResponseHead, body: Option<&[u8]>) {
        let status = head
            .status
            .map_or_else(|| "-".to_owned(), |s| s.as_u16().to_string());
        let message = match body {
            Some(body) => format!("<-- {status} {} ({} bytes)", head.url, body.len()),
            None => format!("<-- {status} {} (streaming)", head.url),
        };
        self.log(LogLevel::Debug, LogCategory::Networking, &message);
    }
}

/// [`NetworkLog`] that emits `tracing` events
///
/// Networking entries use the `restwire::networking` target and streaming
/// entries `restwire::streaming`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

macro_rules! emit {
    ($level:expr, $target:literal, $message:expr) => {
        match $level {
            LogLevel::Debug => tracing::debug!(target: $target, "{}", $message),
            LogLevel::Info => tracing::info!(target: $target, "{}", $message),
            LogLevel::Warning => tracing::warn!(target: $target, "{}", $message),
            LogLevel::Error => tracing::error!(target: $target, "{}", $message),
        }
    };
}

impl NetworkLog for TracingLog {
    fn log(&self, level: LogLevel, category: LogCategory, message: &str) {
        match category {
            LogCategory::Networking => emit!(level, "restwire::networking", message),
            LogCategory::Streaming => emit!(level, "restwire::streaming", message),
        }
    }
}
