//! The ordered route table.
//!
//! Routes are matched in registration order and the first match wins; there is no
//! longest-prefix or best-match resolution. A route matches when:
//!
//! - its pattern starts the raw path exactly at position 0, or at position 1 when the pattern
//!   has no leading `/`
//! - the pattern is followed directly by `?`, or by nothing at all (a strict prefix never matches)
//! - its method is unset, or equal to the request method
//!
//! Case-insensitive routes are stored lowercased and compared with the lowercased raw path.
//!
//! ```
//! use http::{Method, StatusCode};
//! use nano_web::handler_fn;
//! use nano_web::router::{get, route, RouteTable};
//!
//! let table = RouteTable::builder()
//!     .route(get("/led", handler_fn(|_req| async { "on" })))
//!     .route(route("status", handler_fn(|_req| async { StatusCode::NO_CONTENT })))
//!     .build()
//!     .unwrap();
//!
//! assert!(table.find(&Method::GET, "/led?level=3").is_some());
//! assert!(table.find(&Method::POST, "/STATUS").is_some());
//! assert!(table.find(&Method::GET, "/led/extra").is_none());
//! ```

mod builder;
mod source;

pub use builder::{RouteBuilder, delete, get, head, options, patch, post, put, route};
pub use source::HandlerSource;

use std::fmt;
use std::sync::Arc;

use http::Method;
use tracing::debug;

use crate::ConfigurationError;
use crate::auth::Authentication;
use crate::handler::RequestHandler;

const QUERY_START: char = '?';

/// A registered route. Immutable once the table is built.
pub struct Route {
    pattern: String,
    method: Option<Method>,
    case_sensitive: bool,
    authentication: Option<Authentication>,
    handler: Arc<dyn RequestHandler>,
}

impl Route {
    /// The pattern as matched, lowercased for case-insensitive routes.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// `None` matches any method.
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// `None` when the route declares no policy, which authorizes every request.
    pub fn authentication(&self) -> Option<&Authentication> {
        self.authentication.as_ref()
    }

    pub fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }

    /// `target` is the raw path, already lowercased for case-insensitive routes.
    fn matches(&self, target: &str, query_start: Option<usize>, method: &Method) -> bool {
        let offset = usize::from(!self.pattern.starts_with('/'));
        let end = self.pattern.len() + offset;

        let anchored = target.get(offset..).is_some_and(|rest| rest.starts_with(self.pattern.as_str()));
        if !anchored {
            return false;
        }

        let exact = match query_start {
            Some(query_start) if query_start > 0 => query_start == end,
            _ => target.len() == end,
        };

        exact && self.method.as_ref().is_none_or(|route_method| route_method == method)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("method", &self.method)
            .field("case_sensitive", &self.case_sensitive)
            .field("authentication", &self.authentication)
            .finish_non_exhaustive()
    }
}

/// Routes in registration order, read-only once built.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new()
    }

    /// Finds the first route matching `method` and the raw path (path plus query).
    pub fn find(&self, method: &Method, raw_path: &str) -> Option<&Route> {
        let query_start = raw_path.find(QUERY_START);
        let mut lowercased: Option<String> = None;

        for route in &self.routes {
            let target = if route.case_sensitive {
                raw_path
            } else {
                lowercased.get_or_insert_with(|| raw_path.to_ascii_lowercase()).as_str()
            };

            if route.matches(target, query_start, method) {
                return Some(route);
            }
        }

        None
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

enum Registration {
    Route(RouteBuilder),
    Source { authentication: Option<String>, routes: Vec<RouteBuilder> },
}

/// Collects explicit routes and handler sources, in order.
///
/// Nothing is validated until [`build`](RouteTableBuilder::build), which fails on the first
/// malformed pattern, method or authentication descriptor.
#[derive(Default)]
pub struct RouteTableBuilder {
    registrations: Vec<Registration>,
}

impl RouteTableBuilder {
    fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, route: RouteBuilder) -> Self {
        self.registrations.push(Registration::Route(route));
        self
    }

    /// Registers every route a source declares, with the source's policy as their default.
    pub fn source(mut self, source: impl HandlerSource) -> Self {
        let authentication = source.authentication().map(str::to_string);
        self.registrations.push(Registration::Source { authentication, routes: source.routes() });
        self
    }

    pub fn build(self) -> Result<RouteTable, ConfigurationError> {
        let mut routes = Vec::new();

        for registration in self.registrations {
            match registration {
                Registration::Route(route) => routes.push(route.build(None)?),
                Registration::Source { authentication, routes: source_routes } => {
                    let source_policy = authentication.as_deref().map(Authentication::parse).transpose()?;
                    for route in source_routes {
                        routes.push(route.build(source_policy.as_ref())?);
                    }
                }
            }
        }

        for route in &routes {
            debug!(pattern = %route.pattern, method = ?route.method, authentication = ?route.authentication, "register route");
        }

        Ok(RouteTable { routes })
    }
}

impl fmt::Debug for RouteTableBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTableBuilder").field("registrations", &self.registrations.len()).finish()
    }
}
