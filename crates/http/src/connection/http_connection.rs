use std::time::Duration;

use futures::StreamExt;
use http::StatusCode;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tokio_util::codec::FramedRead;
use tracing::{error, warn};

use crate::codec::RequestDecoder;
use crate::protocol::{ParseError, RequestContext, ResponseSink};

/// An accepted HTTP connection waiting for its request.
///
/// # Type Parameters
///
/// * `S`: The async stream type, a TCP stream or a TLS stream over one
pub struct HttpConnection<S> {
    framed_read: FramedRead<ReadHalf<S>, RequestDecoder>,
    response: ResponseSink,
}

impl<S> HttpConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), 8 * 1024),
            response: ResponseSink::new(writer),
        }
    }

    /// Reads the request, giving up after `read_timeout`.
    ///
    /// On a malformed request a `400 Bad Request` is sent before the error is returned.
    pub async fn read_request(mut self, read_timeout: Duration) -> Result<RequestContext, ParseError> {
        let next = match tokio::time::timeout(read_timeout, self.framed_read.next()).await {
            Ok(next) => next,
            Err(_elapsed) => {
                self.response.discard();
                return Err(ParseError::Timeout);
            }
        };

        match next {
            Some(Ok(request)) => Ok(RequestContext::new(request, self.response)),

            Some(Err(e)) => {
                error!(cause = %e, "can't receive request");
                self.reject(StatusCode::BAD_REQUEST).await;
                Err(e)
            }

            None => {
                self.response.discard();
                Err(ParseError::ConnectionClosed)
            }
        }
    }

    async fn reject(&mut self, status: StatusCode) {
        if let Err(e) = self.response.write_status(status) {
            warn!(cause = %e, "can't write error response");
        }
        if let Err(e) = self.response.close().await {
            warn!(cause = %e, "can't send error response");
        }
    }
}

impl<S> std::fmt::Debug for HttpConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection").field("response", &self.response).finish_non_exhaustive()
    }
}
