use super::RouteBuilder;

/// A group of routes registered together, such as every endpoint of one device component.
///
/// The source's authentication descriptor applies to each of its routes that declares no
/// policy of its own.
///
/// ```
/// use nano_web::handler_fn;
/// use nano_web::router::{get, post, HandlerSource, RouteBuilder, RouteTable};
///
/// struct Led;
///
/// impl HandlerSource for Led {
///     fn authentication(&self) -> Option<&str> {
///         Some("Basic")
///     }
///
///     fn routes(&self) -> Vec<RouteBuilder> {
///         vec![
///             get("/led", handler_fn(|_req| async { "off" })),
///             post("/led", handler_fn(|_req| async { "on" })),
///         ]
///     }
/// }
///
/// let table = RouteTable::builder().source(Led).build().unwrap();
/// assert_eq!(table.len(), 2);
/// ```
pub trait HandlerSource {
    fn authentication(&self) -> Option<&str> {
        None
    }

    fn routes(&self) -> Vec<RouteBuilder>;
}
