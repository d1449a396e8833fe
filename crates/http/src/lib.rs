//! The listener side of nano-web
//!
//! This crate accepts HTTP/1.x connections, plain or over TLS, reads the single request each
//! connection carries and hands it out as a [`protocol::RequestContext`]: method, raw path,
//! headers, presented credentials, body, and a write-once [`protocol::ResponseSink`].
//!
//! It deliberately stays small, as it targets constrained devices:
//!
//! - one request per connection, every response carries `Connection: close`
//! - bodies are read by `Content-Length` only, chunked requests are rejected with 400
//! - maximum header size 8KB, at most 64 headers, maximum body size 64KB
//!
//! # Example
//!
//! ```no_run
//! use http::StatusCode;
//! use nano_http::listener::{HttpListener, Listener, ListenerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut listener = HttpListener::new(ListenerConfig::plain("127.0.0.1:8080".parse().unwrap()));
//!     listener.start().await.expect("bind failed");
//!
//!     while let Ok(mut ctx) = listener.accept().await {
//!         tokio::spawn(async move {
//!             let response = ctx.response_mut();
//!             let _ = response.write_status(StatusCode::NO_CONTENT);
//!             let _ = response.close().await;
//!         });
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`listener`]: the [`listener::Listener`] trait and the TCP based [`listener::HttpListener`]
//! - [`connection`]: reads the request carried by one accepted connection
//! - [`codec`]: request decoding and response encoding
//! - [`protocol`]: request context, credentials, response sink and error types
//! - [`tls`]: rustls configuration for secure listeners

pub mod codec;
pub mod connection;
pub mod listener;
pub mod protocol;
pub mod tls;

mod utils;
pub(crate) use utils::ensure;
