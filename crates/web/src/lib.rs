//! A small HTTP router for embedded devices
//!
//! nano-web serves a fixed set of routes, each optionally protected by Basic or API key
//! authentication, over a [`nano_http`] listener. Every request is dispatched on its own task:
//!
//! 1. the route table is scanned in registration order, the first route whose pattern and
//!    method match wins
//! 2. the route's authentication policy is checked, falling back to the server-wide default
//!    credential or key
//! 3. the handler's response is written and the connection closed; requests no route matches
//!    get the catch-all handler, or `404`
//!
//! # Example
//!
//! ```no_run
//! use http::{Request, StatusCode};
//! use bytes::Bytes;
//! use nano_http::protocol::Credentials;
//! use nano_web::router::{get, post};
//! use nano_web::{handler_fn, Server, UrlParams};
//!
//! async fn set_led(req: Request<Bytes>) -> (StatusCode, String) {
//!     match UrlParams::from_request(&req).get("level") {
//!         Some(level) => (StatusCode::OK, format!("led at {level}")),
//!         None => (StatusCode::BAD_REQUEST, "missing level".to_string()),
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::builder()
//!         .port(8080)
//!         .default_credential(Credentials::new("admin", "1234"))
//!         .route(get("/status", handler_fn(|_req| async { "ok" })))
//!         .route(post("/led", handler_fn(set_led)).authentication("Basic"))
//!         .build()?;
//!
//!     server.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.stop().await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod dispatcher;
pub mod responder;
pub mod router;
pub mod server;
pub mod url_params;

mod error;
mod handler;

pub use auth::Authentication;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{ConfigurationError, ServerError};
pub use handler::{FnHandler, HandlerError, RequestHandler, handler_fn};
pub use responder::Responder;
pub use router::{HandlerSource, RouteTable};
pub use server::{Protocol, Server, ServerBuilder, ServerStatus};
pub use url_params::{UrlParameter, UrlParams};
