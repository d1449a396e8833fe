//! Conversion of handler results into HTTP responses.
//!
//! The [`Responder`] trait lets a handler return plain values (`String`, `&'static str`,
//! a [`StatusCode`], a `(StatusCode, T)` pair, a full `Response`) instead of building a
//! response by hand.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{HeaderValue, Response, StatusCode};
use mime::Mime;

pub trait Responder {
    fn into_response(self) -> Response<Bytes>;
}

impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn into_response(self) -> Response<Bytes> {
        match self {
            Ok(t) => t.into_response(),
            Err(e) => e.into_response(),
        }
    }
}

/// `None` answers `404 Not Found`.
impl<T: Responder> Responder for Option<T> {
    fn into_response(self) -> Response<Bytes> {
        match self {
            Some(t) => t.into_response(),
            None => status(StatusCode::NOT_FOUND),
        }
    }
}

impl<B> Responder for Response<B>
where
    B: Into<Bytes>,
{
    fn into_response(self) -> Response<Bytes> {
        self.map(Into::into)
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn into_response(self) -> Response<Bytes> {
        let (status, responder) = self;
        let mut response = responder.into_response();
        *response.status_mut() = status;
        response
    }
}

impl Responder for StatusCode {
    fn into_response(self) -> Response<Bytes> {
        status(self)
    }
}

impl Responder for () {
    fn into_response(self) -> Response<Bytes> {
        status(StatusCode::OK)
    }
}

impl Responder for String {
    fn into_response(self) -> Response<Bytes> {
        text(self)
    }
}

impl Responder for &'static str {
    fn into_response(self) -> Response<Bytes> {
        text(self)
    }
}

impl Responder for Bytes {
    fn into_response(self) -> Response<Bytes> {
        with_content_type(self, &mime::APPLICATION_OCTET_STREAM)
    }
}

/// An empty response with the given status code.
pub fn status(status: StatusCode) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status;
    response
}

/// A `200 OK` response with a UTF-8 text body.
pub fn text(body: impl Into<Bytes>) -> Response<Bytes> {
    with_content_type(body.into(), &mime::TEXT_PLAIN_UTF_8)
}

const FALLBACK_CHALLENGE: &str = "Basic realm=\"nano-web\"";

/// `401 Unauthorized`, with a basic auth challenge for `realm` when given.
///
/// Quotes and backslashes in `realm` are escaped, characters a header can't carry become `_`.
pub fn unauthorized(realm: Option<&str>) -> Response<Bytes> {
    let mut response = status(StatusCode::UNAUTHORIZED);
    if let Some(realm) = realm {
        let challenge = HeaderValue::from_str(&basic_challenge(realm))
            .unwrap_or_else(|_invalid| HeaderValue::from_static(FALLBACK_CHALLENGE));
        response.headers_mut().insert(WWW_AUTHENTICATE, challenge);
    }
    response
}

fn basic_challenge(realm: &str) -> String {
    let mut challenge = String::with_capacity(realm.len() + 16);
    challenge.push_str("Basic realm=\"");
    for c in realm.chars() {
        match c {
            '"' | '\\' => {
                challenge.push('\\');
                challenge.push(c);
            }
            ' '..='~' => challenge.push(c),
            _ => challenge.push('_'),
        }
    }
    challenge.push('"');
    challenge
}

fn with_content_type(body: Bytes, content_type: &Mime) -> Response<Bytes> {
    let mut response = Response::new(body);
    if let Ok(value) = HeaderValue::from_str(content_type.as_ref()) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}
