//! HTTP connection handling module
//!
//! - [`HttpConnection`]: reads the single request carried by an accepted connection and turns
//!   it into a [`RequestContext`](crate::protocol::RequestContext). Malformed requests are
//!   answered with `400 Bad Request` right here and never reach the consumer.

mod http_connection;

pub use http_connection::HttpConnection;
