//! Per-route authentication.
//!
//! A route declares its policy with a compact descriptor:
//!
//! | descriptor            | policy                                               |
//! |-----------------------|------------------------------------------------------|
//! | `None`                | no authentication                                    |
//! | `Basic`               | basic auth against the server-wide default credential |
//! | `Basic:user password` | basic auth against `user` / `password`               |
//! | `ApiKey`              | `ApiKey` header against the server-wide default key  |
//! | `ApiKey:thekey`       | `ApiKey` header against `thekey`                     |
//!
//! Descriptors are parsed when the route table is built, so a malformed one stops the server
//! from starting instead of failing requests.

use std::str::FromStr;

use arc_swap::ArcSwapOption;
use nano_http::protocol::{Credentials, RequestContext};

use crate::ConfigurationError;

/// Name of the header an `ApiKey` route reads the key from.
pub const API_KEY_HEADER: &str = "ApiKey";

const NONE: &str = "None";
const BASIC: &str = "Basic";
const API_KEY: &str = "ApiKey";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    None,
    /// `None` defers to the server-wide default credential.
    Basic(Option<Credentials>),
    /// `None` defers to the server-wide default key.
    ApiKey(Option<String>),
}

impl Authentication {
    pub fn parse(descriptor: &str) -> Result<Self, ConfigurationError> {
        if let Some(rest) = descriptor.strip_prefix(NONE) {
            if !rest.is_empty() {
                return Err(ConfigurationError::invalid_authentication(descriptor, "'None' must appear alone"));
            }
            return Ok(Authentication::None);
        }

        if let Some(rest) = descriptor.strip_prefix(BASIC) {
            if rest.is_empty() {
                return Ok(Authentication::Basic(None));
            }
            let credential = rest
                .strip_prefix(':')
                .ok_or_else(|| ConfigurationError::invalid_authentication(descriptor, "expected 'Basic:user password'"))?;
            let (username, password) = credential.split_once(' ').ok_or_else(|| {
                ConfigurationError::invalid_authentication(descriptor, "missing space between user and password")
            })?;
            return Ok(Authentication::Basic(Some(Credentials::new(username, password))));
        }

        if let Some(rest) = descriptor.strip_prefix(API_KEY) {
            if rest.is_empty() {
                return Ok(Authentication::ApiKey(None));
            }
            let key = rest
                .strip_prefix(':')
                .ok_or_else(|| ConfigurationError::invalid_authentication(descriptor, "expected 'ApiKey:key'"))?;
            return Ok(Authentication::ApiKey(Some(key.to_string())));
        }

        Err(ConfigurationError::invalid_authentication(descriptor, "expected one of 'None', 'Basic' or 'ApiKey'"))
    }

    /// Checks the request against this policy, falling back to `defaults` where the policy
    /// carries no credential or key of its own.
    pub fn is_authorized(&self, ctx: &RequestContext, defaults: &AuthDefaults) -> bool {
        match self {
            Authentication::None => true,

            Authentication::Basic(credential) => {
                let default_credential = defaults.credential.load();
                let effective = credential.as_ref().or(default_credential.as_deref());
                match (effective, ctx.credentials()) {
                    (Some(effective), Some(presented)) => {
                        effective.username() == presented.username() && effective.password() == presented.password()
                    }
                    _ => false,
                }
            }

            Authentication::ApiKey(key) => {
                let default_key = defaults.api_key.load();
                let effective = key.as_deref().or(default_key.as_deref().map(String::as_str));
                let presented = ctx.headers().get(API_KEY_HEADER).map(|value| value.as_bytes());
                match (effective, presented) {
                    (Some(effective), Some(presented)) => effective.as_bytes() == presented,
                    _ => false,
                }
            }
        }
    }

    /// Whether a rejected request gets a `WWW-Authenticate` challenge.
    pub fn challenges(&self) -> bool {
        matches!(self, Authentication::Basic(_))
    }
}

impl FromStr for Authentication {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Authentication::parse(s)
    }
}

/// Server-wide credential and key used by policies that don't carry their own.
///
/// Both can be swapped while the server is running, the next request sees the new value.
#[derive(Debug, Default)]
pub struct AuthDefaults {
    credential: ArcSwapOption<Credentials>,
    api_key: ArcSwapOption<String>,
}

impl AuthDefaults {
    pub fn new(credential: Option<Credentials>, api_key: Option<String>) -> Self {
        let defaults = Self::default();
        defaults.set_credential(credential);
        defaults.set_api_key(api_key);
        defaults
    }

    pub fn set_credential(&self, credential: Option<Credentials>) {
        self.credential.store(credential.map(Into::into));
    }

    pub fn set_api_key(&self, api_key: Option<String>) {
        self.api_key.store(api_key.map(Into::into));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use bytes::Bytes;
    use http::Request;
    use http::header::AUTHORIZATION;
    use nano_http::protocol::ResponseSink;

    fn ctx_with(header: Option<(&str, String)>) -> RequestContext {
        let mut builder = Request::builder().uri("/secure");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        RequestContext::new(builder.body(Bytes::new()).unwrap(), ResponseSink::new(tokio::io::sink()))
    }

    fn basic(user: &str, password: &str) -> RequestContext {
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
        ctx_with(Some((AUTHORIZATION.as_str(), format!("Basic {token}"))))
    }

    fn api_key(key: &str) -> RequestContext {
        ctx_with(Some((API_KEY_HEADER, key.to_string())))
    }

    #[test]
    fn parse_descriptors() {
        assert_eq!(Authentication::parse("None").unwrap(), Authentication::None);
        assert_eq!(Authentication::parse("Basic").unwrap(), Authentication::Basic(None));
        assert_eq!(
            Authentication::parse("Basic:alice secret").unwrap(),
            Authentication::Basic(Some(Credentials::new("alice", "secret")))
        );
        assert_eq!(Authentication::parse("ApiKey").unwrap(), Authentication::ApiKey(None));
        assert_eq!(Authentication::parse("ApiKey:k1").unwrap(), Authentication::ApiKey(Some("k1".to_string())));
    }

    #[test]
    fn password_keeps_everything_after_first_space() {
        assert_eq!(
            "Basic:alice my secret".parse::<Authentication>().unwrap(),
            Authentication::Basic(Some(Credentials::new("alice", "my secret")))
        );
    }

    #[test]
    fn reject_malformed_descriptors() {
        for descriptor in ["Basic:bad", "BasicX", "Basic alice secret", "NoneX", "None:x", "ApiKeyX", "ApiKey k1", "basic", "Bearer", ""] {
            let result = Authentication::parse(descriptor);
            assert!(matches!(result, Err(ConfigurationError::InvalidAuthentication { .. })), "{descriptor}");
        }
    }

    #[test]
    fn none_is_always_authorized() {
        assert!(Authentication::None.is_authorized(&ctx_with(None), &AuthDefaults::default()));
    }

    #[test]
    fn basic_with_route_credential() {
        let policy = Authentication::parse("Basic:alice secret").unwrap();
        let defaults = AuthDefaults::new(Some(Credentials::new("admin", "admin")), None);

        assert!(policy.is_authorized(&basic("alice", "secret"), &defaults));
        assert!(!policy.is_authorized(&basic("admin", "admin"), &defaults));
        assert!(!policy.is_authorized(&ctx_with(None), &defaults));
    }

    #[test]
    fn basic_compares_presented_password() {
        let policy = Authentication::Basic(Some(Credentials::new("alice", "secret")));
        assert!(!policy.is_authorized(&basic("alice", "wrong"), &AuthDefaults::default()));
    }

    #[test]
    fn basic_falls_back_to_default_credential() {
        let policy = Authentication::Basic(None);
        let defaults = AuthDefaults::new(Some(Credentials::new("admin", "1234")), None);

        assert!(policy.is_authorized(&basic("admin", "1234"), &defaults));
        assert!(!policy.is_authorized(&basic("admin", "4321"), &defaults));

        defaults.set_credential(Some(Credentials::new("admin", "4321")));
        assert!(policy.is_authorized(&basic("admin", "4321"), &defaults));
    }

    #[test]
    fn basic_without_any_credential_rejects() {
        assert!(!Authentication::Basic(None).is_authorized(&basic("", ""), &AuthDefaults::default()));
    }

    #[test]
    fn api_key_matches_header() {
        let policy = Authentication::parse("ApiKey:k1").unwrap();
        let defaults = AuthDefaults::default();

        assert!(policy.is_authorized(&api_key("k1"), &defaults));
        assert!(!policy.is_authorized(&api_key("k2"), &defaults));
        assert!(!policy.is_authorized(&ctx_with(None), &defaults));
    }

    #[test]
    fn api_key_falls_back_to_default_key() {
        let policy = Authentication::ApiKey(None);
        let defaults = AuthDefaults::new(None, Some("device-key".to_string()));

        assert!(policy.is_authorized(&api_key("device-key"), &defaults));
        assert!(!policy.is_authorized(&api_key("other"), &defaults));
        assert!(!policy.is_authorized(&api_key("device-key"), &AuthDefaults::default()));
    }

    #[test]
    fn only_basic_challenges() {
        assert!(Authentication::Basic(None).challenges());
        assert!(!Authentication::ApiKey(None).challenges());
        assert!(!Authentication::None.challenges());
    }
}
