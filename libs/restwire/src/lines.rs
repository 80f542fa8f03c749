use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::BytesMut;
use futures::Stream;

use crate::error::NetworkError;
use crate::transport::ByteStream;

/// Text lines of a streaming response body
///
/// Returned by [`StreamingExecutor`](crate::StreamingExecutor). The stream is
/// cold: nothing is read until it is polled. Lines are split on `\n` with a
/// trailing `\r` removed, and invalid UTF-8 is replaced lossily. An
/// unterminated last line is yielded when the body ends.
///
/// A read failure is yielded once as `Err` and ends the stream; any partial
/// line buffered at that point is discarded. Dropping the stream drops the
/// underlying body, which abandons the read.
pub struct LineStream {
    body: ByteStream,
    buffer: BytesMut,
    scanned: usize,
    finished: bool,
}

impl LineStream {
    #[must_use]
    pub fn new(body: ByteStream) -> Self {
        Self {
            body,
            buffer: BytesMut::new(),
            scanned: 0,
            finished: false,
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let offset = self.buffer[self.scanned..].iter().position(|b| *b == b'\n');
        let Some(offset) = offset else {
            self.scanned = self.buffer.len();
            return None;
        };

        let line = self.buffer.split_to(self.scanned + offset + 1);
        self.scanned = 0;
        Some(decode_line(&line[..line.len() - 1]))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

impl Stream for LineStream {
    type Item = Result<String, NetworkError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(line) = this.take_line() {
                return Poll::Ready(Some(Ok(line)));
            }

            if this.finished {
                if this.buffer.is_empty() {
                    return Poll::Ready(None);
                }
                let rest = this.buffer.split();
                this.scanned = 0;
                return Poll::Ready(Some(Ok(decode_line(&rest))));
            }

            match ready!(this.body.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => this.buffer.extend_from_slice(&chunk),
                Some(Err(err)) => {
                    this.finished = true;
                    this.buffer.clear();
                    this.scanned = 0;
                    return Poll::Ready(Some(Err(err.into())));
                }
                None => this.finished = true,
            }
        }
    }
}

impl std::fmt::Debug for LineStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineStream")
            .field("buffered", &self.buffer.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
