//! HTTP request decoder
//!
//! Decodes one complete HTTP/1.x request, head and body, from a byte stream. Heads are parsed
//! with `httparse`; bodies are read by `Content-Length` only, chunked transfer encoding is
//! rejected.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB
//! - Maximum body size: 64KB

use bytes::{Bytes, BytesMut};
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::ParseError;

/// Maximum number of headers allowed in a request
pub const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Maximum size in bytes allowed for a request body
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// A decoder producing complete `Request<Bytes>` values.
///
/// The decoder keeps the parsed head while it waits for the rest of the body:
/// - `head == None`: currently parsing the head
/// - `head == Some(..)`: waiting until `Content-Length` bytes are buffered
#[derive(Debug, Default)]
pub struct RequestDecoder {
    head: Option<(Parts, usize)>,
}

impl RequestDecoder {
    /// Creates a new `RequestDecoder` instance
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for RequestDecoder {
    type Item = Request<Bytes>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.head.is_none() {
            match decode_head(src)? {
                Some(head) => self.head = Some(head),
                None => return Ok(None),
            }
        }

        let body_length = match &self.head {
            Some((_, length)) => *length,
            None => return Ok(None),
        };

        if src.len() < body_length {
            src.reserve(body_length - src.len());
            return Ok(None);
        }

        let Some((parts, _)) = self.head.take() else {
            return Ok(None);
        };
        let body = src.split_to(body_length).freeze();
        Ok(Some(Request::from_parts(parts, body)))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(request) => Ok(Some(request)),
            None if buf.is_empty() && self.head.is_none() => Ok(None),
            None => Err(ParseError::ConnectionClosed),
        }
    }
}

fn decode_head(src: &mut BytesMut) -> Result<Option<(Parts, usize)>, ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
    let mut req = httparse::Request::new(&mut headers);

    let parsed = req.parse(src).map_err(|e| match e {
        Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
        e => ParseError::invalid_header(e.to_string()),
    })?;

    let body_offset = match parsed {
        Status::Complete(body_offset) => body_offset,
        Status::Partial => {
            ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
            return Ok(None);
        }
    };

    trace!(header_size = body_offset, "parsed request head");
    ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

    let version = match req.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        // HTTP/2 and HTTP/3 are not supported
        _ => return Err(ParseError::InvalidVersion(req.version)),
    };
    let method = req.method.ok_or(ParseError::InvalidMethod)?;
    let method = Method::from_bytes(method.as_bytes()).map_err(|_e| ParseError::InvalidMethod)?;
    let uri = req.path.ok_or(ParseError::InvalidUri)?.parse::<Uri>().map_err(|_e| ParseError::InvalidUri)?;

    let mut header_map = HeaderMap::with_capacity(req.headers.len());
    for header in req.headers.iter() {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_header)?;
        let value = HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_header)?;
        header_map.append(name, value);
    }

    let body_length = parse_body_length(&header_map)?;

    let mut request = Request::new(());
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.version_mut() = version;
    *request.headers_mut() = header_map;
    let (parts, ()) = request.into_parts();

    let _head = src.split_to(body_offset);
    Ok(Some((parts, body_length)))
}

/// Determines the body length from `Content-Length`.
///
/// Chunked bodies are not supported, a request announcing `Transfer-Encoding` is rejected.
fn parse_body_length(headers: &HeaderMap) -> Result<usize, ParseError> {
    ensure!(
        !headers.contains_key(http::header::TRANSFER_ENCODING),
        ParseError::invalid_body("transfer-encoding is not supported, send a content-length instead")
    );

    let Some(cl_value) = headers.get(http::header::CONTENT_LENGTH) else {
        return Ok(0);
    };

    let cl_str = cl_value.to_str().map_err(|_e| ParseError::invalid_content_length("value can't to_str"))?;
    let length =
        cl_str.trim().parse::<usize>().map_err(|_e| ParseError::invalid_content_length(format!("value {cl_str} is not usize")))?;

    ensure!(length <= MAX_BODY_BYTES, ParseError::too_large_body(length, MAX_BODY_BYTES));
    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /index.html?a=1&b=2 HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let mut buf = BytesMut::from(str);
        let request = RequestDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.version(), Version::HTTP_11);
        assert_eq!(request.uri().path(), "/index.html");
        assert_eq!(request.uri().query(), Some("a=1&b=2"));
        assert_eq!(request.headers().len(), 3);
        assert_eq!(request.headers().get(http::header::HOST), Some(&HeaderValue::from_static("127.0.0.1:8080")));
        assert!(request.body().is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn wait_for_complete_body() {
        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::from("POST /led HTTP/1.1\r\nContent-Length: 5\r\n\r\nab");

        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"cde");
        let request = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.body(), &Bytes::from_static(b"abcde"));
    }

    #[test]
    fn partial_head() {
        let mut buf = BytesMut::from("GET /index.html HTTP/1.1\r\nHost: 127.0.0.1");
        assert!(RequestDecoder::new().decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn reject_chunked_body() {
        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n");
        let result = RequestDecoder::new().decode(&mut buf);
        assert!(matches!(result, Err(ParseError::InvalidBody { .. })));
    }

    #[test]
    fn reject_too_large_body() {
        let mut buf = BytesMut::from(format!("POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n", MAX_BODY_BYTES + 1).as_str());
        let result = RequestDecoder::new().decode(&mut buf);
        assert!(matches!(result, Err(ParseError::TooLargeBody { .. })));
    }

    #[test]
    fn reject_invalid_content_length() {
        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\n");
        let result = RequestDecoder::new().decode(&mut buf);
        assert!(matches!(result, Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn eof_inside_body_is_an_error() {
        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::from("POST /led HTTP/1.1\r\nContent-Length: 5\r\n\r\nab");
        assert!(matches!(decoder.decode_eof(&mut buf), Err(ParseError::ConnectionClosed)));
    }
}
