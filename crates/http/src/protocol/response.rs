//! The write-once response side of an accepted request.

use std::fmt;

use bytes::Bytes;
use futures::SinkExt;
use http::{Response, StatusCode};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedWrite;
use tracing::warn;

use crate::codec::ResponseEncoder;
use crate::ensure;
use crate::protocol::SendError;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The sink a response is written to.
///
/// A response can be written at most once and the sink must be closed exactly once. Closing
/// encodes the written response (or an empty `200 OK` if nothing was written), flushes it and
/// shuts the connection's write half down.
pub struct ResponseSink {
    framed_write: Option<FramedWrite<BoxedWriter, ResponseEncoder>>,
    response: Option<Response<Bytes>>,
    written: bool,
}

impl ResponseSink {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: BoxedWriter = Box::new(writer);
        Self { framed_write: Some(FramedWrite::new(writer, ResponseEncoder::new())), response: None, written: false }
    }

    /// Stores the response to send on [`close`](Self::close).
    pub fn write(&mut self, response: Response<Bytes>) -> Result<(), SendError> {
        ensure!(!self.is_closed(), SendError::AlreadyClosed);
        ensure!(!self.written, SendError::AlreadyWritten);
        self.response = Some(response);
        self.written = true;
        Ok(())
    }

    /// Shorthand for writing a response with an empty body.
    pub fn write_status(&mut self, status: StatusCode) -> Result<(), SendError> {
        let mut response = Response::new(Bytes::new());
        *response.status_mut() = status;
        self.write(response)
    }

    pub fn is_written(&self) -> bool {
        self.written
    }

    pub fn is_closed(&self) -> bool {
        self.framed_write.is_none()
    }

    /// Status of the written response, if any has been written and not yet sent.
    pub fn status(&self) -> Option<StatusCode> {
        self.response.as_ref().map(Response::status)
    }

    /// Sends the response and shuts the connection's write half down.
    pub async fn close(&mut self) -> Result<(), SendError> {
        let mut framed_write = self.framed_write.take().ok_or(SendError::AlreadyClosed)?;
        let response = self.response.take().unwrap_or_else(|| Response::new(Bytes::new()));

        framed_write.send(response).await?;
        framed_write.get_mut().shutdown().await.map_err(SendError::io)?;
        Ok(())
    }

    /// Drops the connection without sending anything.
    pub(crate) fn discard(&mut self) {
        self.framed_write.take();
        self.response.take();
    }
}

impl Drop for ResponseSink {
    fn drop(&mut self) {
        if self.framed_write.is_some() {
            warn!("response sink dropped without being closed");
        }
    }
}

impl fmt::Debug for ResponseSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseSink")
            .field("status", &self.status())
            .field("written", &self.written)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn close_sends_written_response() {
        let (writer, mut reader) = tokio::io::duplex(1024);
        let mut sink = ResponseSink::new(writer);

        sink.write(Response::builder().status(StatusCode::CREATED).body(Bytes::from_static(b"done")).unwrap()).unwrap();
        assert_eq!(sink.status(), Some(StatusCode::CREATED));
        sink.close().await.unwrap();

        let mut raw = String::new();
        reader.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(raw.contains("content-length: 4\r\n"));
        assert!(raw.ends_with("\r\n\r\ndone"));
    }

    #[tokio::test]
    async fn close_without_write_sends_empty_ok() {
        let (writer, mut reader) = tokio::io::duplex(1024);
        let mut sink = ResponseSink::new(writer);
        sink.close().await.unwrap();

        let mut raw = String::new();
        reader.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(raw.contains("content-length: 0\r\n"));
    }

    #[tokio::test]
    async fn write_and_close_only_once() {
        let mut sink = ResponseSink::new(tokio::io::sink());
        assert!(!sink.is_written());

        sink.write_status(StatusCode::NOT_FOUND).unwrap();
        assert!(sink.is_written());
        assert!(matches!(sink.write_status(StatusCode::OK), Err(SendError::AlreadyWritten)));

        sink.close().await.unwrap();
        assert!(sink.is_closed());
        assert!(matches!(sink.close().await, Err(SendError::AlreadyClosed)));
        assert!(matches!(sink.write_status(StatusCode::OK), Err(SendError::AlreadyClosed)));
    }
}
