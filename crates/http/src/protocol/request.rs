//! Accepted request handling.
//!
//! A [`RequestContext`] is what a [`Listener`](crate::listener::Listener) hands out for every
//! accepted connection: the fully read request together with the [`ResponseSink`] used to
//! answer it.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::uri::PathAndQuery;
use http::{HeaderMap, HeaderValue, Method, Request, Uri, Version};

use crate::protocol::ResponseSink;

/// A username/password pair.
///
/// Used both for the credentials a client presents through `Authorization: Basic` and for the
/// credentials a server expects.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Decodes an `Authorization` header value of the `Basic` scheme.
    ///
    /// Returns `None` for any other scheme or for a malformed value.
    pub fn from_authorization(value: &HeaderValue) -> Option<Self> {
        let (scheme, token) = value.to_str().ok()?.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = STANDARD.decode(token.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Self::new(username, password))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("username", &self.username).field("password", &"***").finish()
    }
}

/// An accepted HTTP request and the sink its response is written to.
#[derive(Debug)]
pub struct RequestContext {
    request: Request<Bytes>,
    credentials: Option<Credentials>,
    response: ResponseSink,
}

impl RequestContext {
    /// Creates a context for a fully read request.
    ///
    /// Presented credentials are decoded from the `Authorization` header, if any.
    pub fn new(request: Request<Bytes>, response: ResponseSink) -> Self {
        let credentials = request.headers().get(AUTHORIZATION).and_then(Credentials::from_authorization);
        Self { request, credentials, response }
    }

    /// Returns the HTTP method of the request
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// Returns the URI of the request
    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    /// Returns the path of the request including the query string, exactly as received.
    pub fn raw_path(&self) -> &str {
        self.request.uri().path_and_query().map_or("/", PathAndQuery::as_str)
    }

    /// Returns the HTTP version of the request
    pub fn version(&self) -> Version {
        self.request.version()
    }

    /// Returns the HTTP headers of the request
    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// Returns the credentials presented with the request
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    pub fn response(&self) -> &ResponseSink {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseSink {
        &mut self.response
    }

    /// Splits the context into the request and its response sink.
    ///
    /// Presented credentials are moved into the request extensions.
    pub fn into_parts(self) -> (Request<Bytes>, ResponseSink) {
        let Self { mut request, credentials, response } = self;
        if let Some(credentials) = credentials {
            request.extensions_mut().insert(credentials);
        }
        (request, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(user_pass: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(user_pass))).unwrap()
    }

    #[test]
    fn decode_basic_credentials() {
        let credentials = Credentials::from_authorization(&basic("alice:secret")).unwrap();
        assert_eq!(credentials.username(), "alice");
        assert_eq!(credentials.password(), "secret");
    }

    #[test]
    fn password_may_contain_colon() {
        let credentials = Credentials::from_authorization(&basic("alice:se:cret")).unwrap();
        assert_eq!(credentials.password(), "se:cret");
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let value = HeaderValue::from_str(&format!("bAsIc {}", STANDARD.encode("bob:pw"))).unwrap();
        assert_eq!(Credentials::from_authorization(&value), Some(Credentials::new("bob", "pw")));
    }

    #[test]
    fn reject_other_schemes_and_garbage() {
        assert_eq!(Credentials::from_authorization(&HeaderValue::from_static("Bearer abc")), None);
        assert_eq!(Credentials::from_authorization(&HeaderValue::from_static("Basic %%%")), None);
        assert_eq!(Credentials::from_authorization(&basic("no-colon")), None);
        assert_eq!(Credentials::from_authorization(&HeaderValue::from_static("Basic")), None);
    }

    #[test]
    fn debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("alice", "secret"));
        assert!(debug.contains("alice"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn context_exposes_request() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/led/on?level=3")
            .header(AUTHORIZATION, basic("alice:secret"))
            .body(Bytes::from_static(b"payload"))
            .unwrap();
        let ctx = RequestContext::new(request, ResponseSink::new(tokio::io::sink()));

        assert_eq!(ctx.method(), &Method::POST);
        assert_eq!(ctx.raw_path(), "/led/on?level=3");
        assert_eq!(ctx.body(), &Bytes::from_static(b"payload"));
        assert_eq!(ctx.credentials(), Some(&Credentials::new("alice", "secret")));

        let (request, mut sink) = ctx.into_parts();
        assert_eq!(request.extensions().get::<Credentials>(), Some(&Credentials::new("alice", "secret")));
        sink.discard();
    }
}
