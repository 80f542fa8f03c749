//! In-memory transport and logger shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use http::{HeaderMap, Method, StatusCode};

use crate::error::{TransportError, TransportErrorCode};
use crate::log::{LogCategory, LogLevel, NetworkLog};
use crate::transport::{
    ResponseHead, StreamingResponse, Transport, TransportRequest, TransportResponse,
};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

enum Reply {
    Status(Option<u16>, Bytes),
    Fail(TransportErrorCode),
}

enum StreamReply {
    Status(u16, Vec<Result<Bytes, TransportError>>),
    Fail(TransportErrorCode),
}

/// Scripted transport: replies are consumed in order, one per call
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Reply>>,
    streams: Mutex<VecDeque<StreamReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.push(Reply::Status(Some(status), Bytes::from(body.to_owned())))
    }

    pub fn respond_non_http(self) -> Self {
        self.push(Reply::Status(None, Bytes::new()))
    }

    pub fn fail(self, code: TransportErrorCode) -> Self {
        self.push(Reply::Fail(code))
    }

    pub fn stream(self, status: u16, chunks: &[&str]) -> Self {
        let chunks = chunks
            .iter()
            .map(|c| Ok(Bytes::from((*c).to_owned())))
            .collect();
        self.push_stream(StreamReply::Status(status, chunks))
    }

    pub fn stream_then_fail(self, chunks: &[&str], code: TransportErrorCode) -> Self {
        let mut items: Vec<Result<Bytes, TransportError>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from((*c).to_owned())))
            .collect();
        items.push(Err(TransportError::new(code)));
        self.push_stream(StreamReply::Status(200, items))
    }

    pub fn fail_stream(self, code: TransportErrorCode) -> Self {
        self.push_stream(StreamReply::Fail(code))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn push(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    fn push_stream(self, reply: StreamReply) -> Self {
        self.streams.lock().unwrap().push_back(reply);
        self
    }

    fn record(&self, request: &TransportRequest) -> String {
        let uri = request.uri().to_string();
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method().clone(),
            uri: uri.clone(),
            headers: request.headers().clone(),
            body: request.body().clone(),
        });
        uri
    }
}

fn head(url: String, status: Option<u16>) -> ResponseHead {
    ResponseHead {
        url,
        status: status.map(|s| StatusCode::from_u16(s).unwrap()),
        headers: HeaderMap::new(),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = self.record(&request);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Status(status, body)) => Ok(TransportResponse {
                head: head(url, status),
                body,
            }),
            Some(Reply::Fail(code)) => Err(TransportError::new(code)),
            None => Err(TransportError::new(TransportErrorCode::Other(-4242))),
        }
    }

    async fn send_streaming(
        &self,
        request: TransportRequest,
    ) -> Result<StreamingResponse, TransportError> {
        let url = self.record(&request);
        let reply = self.streams.lock().unwrap().pop_front();
        match reply {
            Some(StreamReply::Status(status, chunks)) => Ok(StreamingResponse {
                head: head(url, Some(status)),
                body: Box::pin(stream::iter(chunks)),
            }),
            Some(StreamReply::Fail(code)) => Err(TransportError::new(code)),
            None => Err(TransportError::new(TransportErrorCode::Other(-4242))),
        }
    }
}

/// Logger that keeps every entry for later inspection
#[derive(Default)]
pub struct RecordingLog {
    entries: Mutex<Vec<(LogLevel, LogCategory, String)>>,
}

impl RecordingLog {
    pub fn entries(&self) -> Vec<(LogLevel, LogCategory, String)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(level, _, _)| *level == LogLevel::Error)
            .map(|(_, _, message)| message)
            .collect()
    }
}

impl NetworkLog for RecordingLog {
    fn log(&self, level: LogLevel, category: LogCategory, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((level, category, message.to_owned()));
    }
}
