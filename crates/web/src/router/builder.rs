use std::fmt;
use std::sync::Arc;

use http::Method;

use super::Route;
use crate::ConfigurationError;
use crate::auth::Authentication;
use crate::handler::RequestHandler;

#[derive(Clone)]
enum Policy {
    Descriptor(String),
    Parsed(Authentication),
}

/// A route declaration, validated when the table is built.
///
/// Routes are case-insensitive and match every method unless told otherwise.
#[derive(Clone)]
pub struct RouteBuilder {
    pattern: String,
    method: Option<String>,
    case_sensitive: bool,
    policy: Option<Policy>,
    handler: Arc<dyn RequestHandler>,
}

impl RouteBuilder {
    pub fn new(pattern: impl Into<String>, handler: Arc<dyn RequestHandler>) -> Self {
        Self { pattern: pattern.into(), method: None, case_sensitive: false, policy: None, handler }
    }

    /// Restricts the route to a method; an empty name matches any method.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    /// Sets the policy from a descriptor such as `Basic:user password`, see [`crate::auth`].
    pub fn authentication(mut self, descriptor: impl Into<String>) -> Self {
        self.policy = Some(Policy::Descriptor(descriptor.into()));
        self
    }

    pub fn policy(mut self, authentication: Authentication) -> Self {
        self.policy = Some(Policy::Parsed(authentication));
        self
    }

    /// Same handler and settings under another pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub(super) fn build(self, default_policy: Option<&Authentication>) -> Result<Route, ConfigurationError> {
        if self.pattern.contains('?') {
            return Err(ConfigurationError::InvalidPattern { pattern: self.pattern });
        }

        let method = match self.method.as_deref() {
            None | Some("") => None,
            Some(name) => Some(Method::from_bytes(name.as_bytes()).map_err(|_invalid| ConfigurationError::InvalidMethod {
                pattern: self.pattern.clone(),
                method: name.to_string(),
            })?),
        };

        let authentication = match self.policy {
            Some(Policy::Descriptor(descriptor)) => Some(Authentication::parse(&descriptor)?),
            Some(Policy::Parsed(authentication)) => Some(authentication),
            None => default_policy.cloned(),
        };

        let pattern = if self.case_sensitive { self.pattern } else { self.pattern.to_ascii_lowercase() };

        Ok(Route { pattern, method, case_sensitive: self.case_sensitive, authentication, handler: self.handler })
    }
}

impl fmt::Debug for RouteBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteBuilder")
            .field("pattern", &self.pattern)
            .field("method", &self.method)
            .field("case_sensitive", &self.case_sensitive)
            .finish_non_exhaustive()
    }
}

/// A route matching any method.
pub fn route<H: RequestHandler + 'static>(pattern: impl Into<String>, handler: H) -> RouteBuilder {
    RouteBuilder::new(pattern, Arc::new(handler))
}

macro_rules! method_route {
    ($($name:ident => $method:ident,)+) => {
        $(
            #[doc = concat!("A route matching `", stringify!($method), "` requests.")]
            pub fn $name<H: RequestHandler + 'static>(pattern: impl Into<String>, handler: H) -> RouteBuilder {
                route(pattern, handler).method(Method::$method.as_str())
            }
        )+
    };
}

method_route! {
    get => GET,
    post => POST,
    put => PUT,
    delete => DELETE,
    head => HEAD,
    options => OPTIONS,
    patch => PATCH,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler_fn;
    use http::StatusCode;

    fn ok() -> impl RequestHandler {
        handler_fn(|_req| async { StatusCode::OK })
    }

    #[test]
    fn method_helpers() {
        let route = put("/led", ok()).build(None).unwrap();
        assert_eq!(route.method(), Some(&Method::PUT));

        let route = super::route("/led", ok()).build(None).unwrap();
        assert_eq!(route.method(), None);
    }

    #[test]
    fn custom_method() {
        let route = route("/led", ok()).method("REBOOT").build(None).unwrap();
        assert_eq!(route.method().map(Method::as_str), Some("REBOOT"));
    }

    #[test]
    fn route_policy_overrides_default() {
        let default = Authentication::Basic(None);

        let inherited = get("/led", ok()).build(Some(&default)).unwrap();
        assert_eq!(inherited.authentication(), Some(&default));

        let own = get("/led", ok()).policy(Authentication::None).build(Some(&default)).unwrap();
        assert_eq!(own.authentication(), Some(&Authentication::None));
    }

    #[test]
    fn pattern_is_lowercased_unless_case_sensitive() {
        assert_eq!(get("/LED/On", ok()).build(None).unwrap().pattern(), "/led/on");
        assert_eq!(get("/LED/On", ok()).case_sensitive().build(None).unwrap().pattern(), "/LED/On");
    }

    #[test]
    fn with_pattern_shares_handler() {
        let on = get("/led/on", ok()).authentication("Basic");
        let off = on.clone().with_pattern("/led/off");

        let off = off.build(None).unwrap();
        assert_eq!(off.pattern(), "/led/off");
        assert_eq!(off.authentication(), Some(&Authentication::Basic(None)));
    }
}
