//! Core protocol types shared between the listener and its consumers.
//!
//! - [`RequestContext`]: an accepted request plus the sink its response goes to
//! - [`Credentials`]: a username/password pair, decoded from `Authorization: Basic`
//! - [`ResponseSink`]: write-once, close-once response side of a connection
//! - [`ParseError`], [`SendError`], [`ListenError`]: error types

mod request;
pub use request::Credentials;
pub use request::RequestContext;

mod response;
pub use response::ResponseSink;

mod error;
pub use error::ListenError;
pub use error::ParseError;
pub use error::SendError;
