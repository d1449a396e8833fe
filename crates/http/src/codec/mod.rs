//! HTTP codec module for decoding requests and encoding responses
//!
//! - [`RequestDecoder`]: decodes one complete request (head and `Content-Length` body)
//! - [`ResponseEncoder`]: encodes one complete response
//!
//! # Example
//!
//! ```
//! use nano_http::codec::RequestDecoder;
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from("GET /status HTTP/1.1\r\nHost: device\r\n\r\n");
//! let request = decoder.decode(&mut buffer).unwrap().unwrap();
//! assert_eq!(request.uri().path(), "/status");
//! ```

mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use request_decoder::{MAX_BODY_BYTES, MAX_HEADER_BYTES, MAX_HEADER_NUM};
pub use response_encoder::ResponseEncoder;
