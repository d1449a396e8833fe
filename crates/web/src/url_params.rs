//! URL parameter decoding
//!
//! Parameters are read from the raw request path: every `name=value` token after the first
//! `?`, separated by `&`. Values are returned verbatim, no percent-decoding is applied.
//!
//! ```
//! use nano_web::url_params::{decode, UrlParameter};
//!
//! assert_eq!(decode("/led?color=red&level="), vec![UrlParameter::new("color", "red"), UrlParameter::new("level", "")]);
//! ```

use bytes::Bytes;
use http::Request;
use http::uri::PathAndQuery;

const QUERY_START: char = '?';
const PARAMETER_SEPARATOR: char = '&';
const VALUE_SEPARATOR: char = '=';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParameter {
    pub name: String,
    pub value: String,
}

impl UrlParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// Decodes the parameters of a raw path, in order of appearance.
///
/// A trailing name without `=` is not represented.
pub fn decode(raw: &str) -> Vec<UrlParameter> {
    let mut params = Vec::new();
    let Some(mut marker) = raw.find(QUERY_START) else {
        return params;
    };

    while let Some(eq) = raw[marker..].find(VALUE_SEPARATOR).map(|i| marker + i) {
        let separator = raw[eq..].find(PARAMETER_SEPARATOR).map(|i| eq + i);
        let value_end = separator.unwrap_or(raw.len());
        params.push(UrlParameter::new(&raw[marker + 1..eq], &raw[eq + 1..value_end]));

        match separator {
            Some(separator) => marker = separator,
            None => break,
        }
    }

    params
}

/// Decoded URL parameters of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParams {
    params: Vec<UrlParameter>,
}

impl UrlParams {
    pub fn from_raw_path(raw: &str) -> Self {
        Self { params: decode(raw) }
    }

    pub fn from_request(request: &Request<Bytes>) -> Self {
        Self::from_raw_path(request.uri().path_and_query().map_or("", PathAndQuery::as_str))
    }

    /// Returns the value of the first parameter named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|param| param.name == name).map(|param| param.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &UrlParameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl IntoIterator for UrlParams {
    type Item = UrlParameter;
    type IntoIter = std::vec::IntoIter<UrlParameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.into_iter()
    }
}
